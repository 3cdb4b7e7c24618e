use {
    anyhow::{Context, Result, bail},
    clap::{Args, Subcommand},
    hugli_config::HugliConfig,
    hugli_whatsapp::{EvolutionApi, qr},
    serde_json::Value,
};

#[derive(Args)]
pub struct ServerArgs {
    /// Base URL of the running hugli server.
    #[arg(long, env = "HUGLI_URL", default_value = "http://localhost:5000")]
    url: String,
}

#[derive(Subcommand)]
pub enum WhatsAppAction {
    /// Show the session status.
    Status(ServerArgs),
    /// Print the pending pairing QR code, if any.
    Qr(ServerArgs),
    /// Tear down and re-initialize the session.
    Restart(ServerArgs),
    /// Unlink the bridge instance so the next start pairs from scratch.
    Logout,
}

pub async fn handle_whatsapp(action: WhatsAppAction, config: &HugliConfig) -> Result<()> {
    let client = reqwest::Client::new();
    match action {
        WhatsAppAction::Status(args) => {
            let body = call(&client, reqwest::Method::GET, &args.url, "status").await?;
            println!("{}", describe_status(&body));
        },
        WhatsAppAction::Qr(args) => {
            let body = call(&client, reqwest::Method::GET, &args.url, "qr").await?;
            println!("{}", describe_qr(&body));
        },
        WhatsAppAction::Restart(args) => {
            println!("Restarting WhatsApp service...");
            let body = call(&client, reqwest::Method::POST, &args.url, "restart").await?;
            if body["success"] != true {
                bail!("failed to restart WhatsApp service: {}", message(&body));
            }
            println!("{}", message(&body));
            println!("Check the server logs or `hugli whatsapp qr` if pairing is needed");
        },
        WhatsAppAction::Logout => {
            let api = EvolutionApi::new(&config.whatsapp.bridge)?;
            api.logout()
                .await
                .with_context(|| format!("failed to log out instance {}", api.instance()))?;
            println!(
                "Instance {} unlinked. Restart the service to pair again.",
                api.instance()
            );
        },
    }
    Ok(())
}

async fn call(client: &reqwest::Client, method: reqwest::Method, base: &str, op: &str) -> Result<Value> {
    let url = format!("{}/api/whatsapp/{op}", base.trim_end_matches('/'));
    let resp = client
        .request(method, &url)
        .send()
        .await
        .with_context(|| format!("could not reach {url}"))?;
    let status = resp.status();
    let body: Value = resp
        .json()
        .await
        .with_context(|| format!("{url} returned a non-JSON body ({status})"))?;
    if status.is_server_error() {
        bail!("{url} returned {status}: {}", message(&body));
    }
    Ok(body)
}

fn message(body: &Value) -> &str {
    body["message"].as_str().unwrap_or("no message")
}

fn describe_status(body: &Value) -> String {
    let mut out = format!(
        "status:     {}\nready:      {}\ntarget:     {}\nreconnects: {}/{}",
        body["derivedStatus"].as_str().unwrap_or("unknown"),
        body["isReady"],
        body["targetAddress"].as_str().unwrap_or("-"),
        body["reconnectAttempts"],
        body["maxReconnectAttempts"],
    );
    if let Some(detail) = body["faultDetail"].as_str() {
        out.push_str(&format!("\nattention:  {detail}"));
    }
    out
}

fn describe_qr(body: &Value) -> String {
    match body["qrCode"].as_str() {
        Some(code) => match qr::render_terminal(code) {
            Some(rendered) => format!("Scan with WhatsApp to pair:\n{rendered}"),
            None => format!("Pairing code: {code}"),
        },
        None => message(body).to_string(),
    }
}
