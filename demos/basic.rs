use std::time::Duration;

use hookhttp::{refresh_with, ClientConfig, HttpClient, RequestDescriptor, RequestOptions};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = std::env::var("HOOKHTTP_BASE_URL")?;
    let token = std::env::var("HOOKHTTP_TOKEN").unwrap_or_default();

    let client = HttpClient::new(
        ClientConfig::new()
            .with_base_url(base_url)
            .with_timeout(Duration::from_secs(5))
            .with_retry(true)
            .with_retry_delay(Duration::from_millis(500))
            .with_refresh_token_callback(refresh_with(move |mut request| {
                let token = token.clone();
                async move {
                    if token.is_empty() {
                        return Ok(None);
                    }
                    request.set_header("Authorization", format!("Bearer {token}"));
                    Ok(Some(request))
                }
            })),
    );

    let admin = client
        .clone_with(&ClientConfig::new().with_header("x-role", "admin"), "admin")
        .ok_or_else(|| anyhow::anyhow!("invalid instance key"))?;

    let response = client
        .get("/get", RequestOptions::new().param("source", "demo"))
        .await?;
    println!("GET {} -> {}", response.status, response.text());

    let response = admin
        .patch("/patch", RequestOptions::new().data(json!({"name": "Kit"})))
        .await?;
    println!("PATCH {} -> {}", response.status, response.text());

    let response = client
        .make_request(RequestDescriptor::new("delete", "/delete"))
        .await?;
    println!("DELETE {}", response.status);

    Ok(())
}
