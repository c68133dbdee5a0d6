//! One-off encryption of single values, for scripting and support.

use {
    anyhow::{Result, bail},
    tokio::io::AsyncReadExt,
};

use crate::context::Context;

/// `-` reads the value from stdin, so secrets stay out of shell history.
async fn read_value(value: String) -> Result<String> {
    if value != "-" {
        return Ok(value);
    }
    let mut buf = String::new();
    tokio::io::stdin().read_to_string(&mut buf).await?;
    Ok(buf.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn handle_encrypt(ctx: &Context, value: String) -> Result<()> {
    let value = read_value(value).await?;
    match ctx.service()?.encrypt(Some(value.as_str())).await? {
        Some(envelope) => println!("{envelope}"),
        None => bail!("nothing to encrypt: value is empty"),
    }
    Ok(())
}

pub async fn handle_decrypt(ctx: &Context, envelope: String) -> Result<()> {
    let envelope = read_value(envelope).await?;
    let plaintext = ctx.service()?.try_decrypt(envelope.trim()).await?;
    println!("{plaintext}");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::context::test_support::config_in};

    #[tokio::test]
    async fn literal_values_pass_through() {
        assert_eq!(read_value("0301234".into()).await.unwrap(), "0301234");
    }

    #[tokio::test]
    async fn blank_value_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = Context::new(config_in(tmp.path()));
        assert!(handle_encrypt(&ctx, "   ".into()).await.is_err());
    }

    #[tokio::test]
    async fn decrypt_reports_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = Context::new(config_in(tmp.path()));
        assert!(handle_decrypt(&ctx, "not-an-envelope".into()).await.is_err());
    }

    #[tokio::test]
    async fn decrypt_accepts_service_output() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = Context::new(config_in(tmp.path()));
        let sealed = ctx
            .service()
            .unwrap()
            .encrypt(Some("Penicillin"))
            .await
            .unwrap()
            .unwrap();
        handle_decrypt(&ctx, sealed.to_string()).await.unwrap();
    }
}
