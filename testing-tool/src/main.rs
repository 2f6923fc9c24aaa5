use std::io::{self, Write};

use anyhow::{Context, Result};
use colored::*;
use reqwest::{Client, Method, Response};
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[tokio::main]
async fn main() -> Result<()> {
    println!("{}", "🩸 Blood Bank Diagnostics Tool".bright_blue().bold());
    println!("{}", "=====================================".bright_blue());
    println!();

    let base_url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("BLOOD_BANK_URL").ok())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = base_url.trim_end_matches('/').to_string();
    println!("{} {}", "🌐 Servidor:".bright_cyan(), base_url);

    let client = Client::new();

    loop {
        println!();
        println!("{}", "📋 MENÚ PRINCIPAL".bright_green().bold());
        println!("{}", "==================".bright_green());
        println!("1. 🏥 Estado de salud");
        println!("2. 📊 Métricas de rendimiento");
        println!("3. 🗄️  Estadísticas de base de datos (dos veces, muestra el cache)");
        println!("4. 📦 Estadísticas del cache");
        println!("5. 🗑️  Invalidar claves por patrón");
        println!("6. 🧹 Vaciar cache");
        println!("7. 🔄 Reiniciar métricas");
        println!("8. 🚪 Salir");
        let choice = prompt("Selecciona una opción (1-8): ")?;

        let result = match choice.as_str() {
            "1" => call(&client, Method::GET, &base_url, "/api/health").await,
            "2" => show_metrics(&client, &base_url).await,
            "3" => show_database_stats(&client, &base_url).await,
            "4" => call(&client, Method::GET, &base_url, "/api/cache/stats").await,
            "5" => {
                let pattern = prompt("Patrón (ej: cache:/api/*): ")?;
                let path = format!(
                    "/api/cache/pattern?pattern={}",
                    urlencoding::encode(&pattern)
                );
                call(&client, Method::DELETE, &base_url, &path).await
            }
            "6" => call(&client, Method::DELETE, &base_url, "/api/cache").await,
            "7" => call(&client, Method::POST, &base_url, "/api/metrics/reset").await,
            "8" => {
                println!("{}", "👋 ¡Hasta luego!".bright_green());
                break;
            }
            _ => {
                println!("{}", "❌ Opción inválida. Intenta de nuevo.".bright_red());
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("{} {:#}", "❌ Error:".bright_red().bold(), e);
        }
    }

    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label.bright_yellow());
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

async fn send(client: &Client, method: Method, base_url: &str, path: &str) -> Result<Response> {
    let url = format!("{}{}", base_url, path);
    println!();
    println!("{} {} {}", "📤".bright_blue(), method, url);

    client
        .request(method, &url)
        .send()
        .await
        .with_context(|| format!("No se pudo contactar {}", url))
}

async fn print_response(response: Response) -> Result<Option<Value>> {
    let status = response.status();
    let cache_status = response
        .headers()
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let status_label = format!("📥 Status: {}", status);
    if status.is_success() {
        println!("{}", status_label.bright_green().bold());
    } else {
        println!("{}", status_label.bright_red().bold());
    }
    if let Some(cache_status) = cache_status {
        println!("{} {}", "💾 x-cache:".bright_magenta(), cache_status);
    }

    let text = response.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            println!("{}", serde_json::to_string_pretty(&json)?);
            Ok(Some(json))
        }
        Err(_) => {
            println!("{}", text);
            Ok(None)
        }
    }
}

async fn call(client: &Client, method: Method, base_url: &str, path: &str) -> Result<()> {
    let response = send(client, method, base_url, path).await?;
    print_response(response).await?;
    Ok(())
}

async fn show_metrics(client: &Client, base_url: &str) -> Result<()> {
    let response = send(client, Method::GET, base_url, "/api/metrics").await?;
    let Some(body) = print_response(response).await? else {
        return Ok(());
    };

    if let Some(suggestions) = body["suggestions"].as_array() {
        println!();
        if suggestions.is_empty() {
            println!("{}", "✅ Sin sugerencias de optimización".bright_green());
        }
        for suggestion in suggestions.iter().filter_map(Value::as_str) {
            println!("{} {}", "💡".bright_yellow(), suggestion);
        }
    }
    if body["memoryWarning"].as_bool() == Some(true) {
        println!("{}", "🚨 Uso de memoria por encima del umbral".bright_red().bold());
    }
    Ok(())
}

async fn show_database_stats(client: &Client, base_url: &str) -> Result<()> {
    for _ in 0..2 {
        call(client, Method::GET, base_url, "/api/database/stats").await?;
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
    Ok(())
}
