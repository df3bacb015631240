#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gestor_server::start_server().await
}
