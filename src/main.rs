use actix_web::HttpServer;
use std::env;
use std::sync::Arc;

use crate::app::config::Config;
use crate::app::factory::CreateApp;
use crate::app::state::registry::AppRegistry;

mod app;
mod ai_agent;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  if env::var_os("RUST_LOG").is_none() {
    env::set_var("RUST_LOG", "actix_web=debug,debug");
  }
  env_logger::init();

  dotenv::dotenv().ok();

  let config: Config = Config::load();

  // One registry shared by every worker, so all HTTP handlers and background
  // analysis tasks see the same per-symbol state.
  let registry: Arc<AppRegistry> = Arc::new(AppRegistry::new());

  let server_builder = HttpServer::new(move || {
    let factory: CreateApp = CreateApp::new(config.clone(), registry.clone());
    factory.build_app().wrap(actix_web::middleware::Logger::default())
  });

  let server = server_builder.bind(("127.0.0.1", 8080))?;

  server.run().await?;

  Ok(())
}
