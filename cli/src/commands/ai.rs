use anyhow::Result;
use serde_json::json;

use larder_core::gemma::model_info;

use crate::gemma::{Backend, GemmaClient};

fn backend_name(backend: &Backend) -> String {
    match backend {
        Backend::Direct { .. } => "direct".to_string(),
        Backend::Proxy { url } => format!("proxy ({url})"),
        Backend::Offline => "offline (mock data)".to_string(),
    }
}

pub(crate) async fn cmd_ai_ping(client: &GemmaClient, json: bool) -> Result<()> {
    let outcome = client.ping().await;
    if json {
        println!(
            "{}",
            json!({
                "ok": outcome.is_ok(),
                "backend": backend_name(client.backend()),
                "error": outcome.as_ref().err().map(ToString::to_string),
            })
        );
    } else {
        match &outcome {
            Ok(()) => println!(
                "{} is reachable via {}",
                client.model(),
                backend_name(client.backend())
            ),
            Err(e) => println!("Connection failed: {e}"),
        }
    }
    Ok(outcome?)
}

pub(crate) fn cmd_ai_info(client: &GemmaClient, json: bool) -> Result<()> {
    let info = model_info();
    if json {
        println!(
            "{}",
            json!({
                "name": info.name,
                "version": info.version,
                "capabilities": info.capabilities,
                "model": client.model(),
                "backend": backend_name(client.backend()),
            })
        );
    } else {
        println!("{} (v{})", info.name, info.version);
        println!("  Model id: {}", client.model());
        println!("  Backend:  {}", backend_name(client.backend()));
        println!("  Capabilities:");
        for capability in &info.capabilities {
            println!("    - {capability}");
        }
    }
    Ok(())
}
