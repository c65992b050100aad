use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    talk_desktop_lib::run()
        .await
        .context("Failed to run Talk Desktop")
}
