use bulletin::app::{
    load_configuration,
    setup_tracing,
    BulletinApp,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing("bulletin".into(), "info".into());
    let configuration = load_configuration()?;
    let app = BulletinApp::from(configuration).await?;
    app.server.await?;
    Ok(())
}
