use actix_web::{web, HttpResponse, Responder};
use std::{sync::Arc};
use serde::{Serialize, Deserialize};

use crate::{app::{controller::analysis_controllers::AnalysisController}};

#[derive(Deserialize, Serialize)]
pub struct StartAnalysisRequest {
  symbols: Vec<String>,
  trade_date: Option<String>,
  selected_analysts: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct ToolCallsQuery {
  agent: Option<String>,
  symbol: Option<String>,
}

pub struct Routes;

impl Routes {

  #[allow(unused)]
  pub fn new() -> Self {
    Routes {}
  }

  pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(Self::health)));
    cfg.service(web::resource("/agent/analysts").route(web::get().to(Self::get_analysts)));
    cfg.service(web::resource("/agent/models").route(web::get().to(Self::get_models)));
    cfg.service(web::resource("/analysis/start").route(web::post().to(Self::start_analysis)));
    cfg.service(web::resource("/analysis/state/{symbol}").route(web::get().to(Self::get_state)));
    cfg.service(web::resource("/analysis/complete/{symbol}").route(web::get().to(Self::is_complete)));
    cfg.service(web::resource("/analysis/tool_calls").route(web::get().to(Self::get_tool_calls)));
    cfg.service(web::resource("/analysis/revision").route(web::get().to(Self::get_revision)));
    cfg.service(web::resource("/analysis/stats").route(web::get().to(Self::get_stats)));
  }

  async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
      "status": "ok",
      "Info": "Welcome to Rust AI_TradingAgents.",
      "code": 200,
    }))
  }

  async fn get_analysts(controller: web::Data<Arc<AnalysisController>>) -> impl Responder {
    match controller.get_available_analysts().await {
      Ok(analysts) => HttpResponse::Ok().json(analysts),
      Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({"error": e.to_string()})),
    }
  }

  async fn get_models(controller: web::Data<Arc<AnalysisController>>) -> impl Responder {
    match controller.get_available_models().await {
      Ok(models) => HttpResponse::Ok().json(models),
      Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({"error": e.to_string()})),
    }
  }

  async fn start_analysis(controller: web::Data<Arc<AnalysisController>>, request: web::Json<StartAnalysisRequest>) -> impl Responder {
    if request.symbols.is_empty() {
      return HttpResponse::BadRequest().json(serde_json::json!({"error": "symbols must not be empty"}));
    }

    let symbols = request.symbols.clone();
    let trade_date = request.trade_date.clone();
    let selected_analysts = request.selected_analysts.clone();

    match controller.start_analysis(symbols, trade_date, selected_analysts).await {
      Ok(response) => HttpResponse::Ok().json(response),
      Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({"error": e.to_string()})),
    }
  }

  async fn get_state(controller: web::Data<Arc<AnalysisController>>, path: web::Path<String>) -> impl Responder {
    let symbol: String = path.into_inner();
    match controller.get_symbol_state(&symbol).await {
      Some(state) => HttpResponse::Ok().json(state),
      None => HttpResponse::NotFound().json(serde_json::json!({"error": format!("No state for symbol {}", symbol)})),
    }
  }

  async fn is_complete(controller: web::Data<Arc<AnalysisController>>, path: web::Path<String>) -> impl Responder {
    let symbol: String = path.into_inner();
    let complete: bool = controller.is_complete(&symbol).await;
    HttpResponse::Ok().json(serde_json::json!({"symbol": symbol, "complete": complete}))
  }

  async fn get_tool_calls(controller: web::Data<Arc<AnalysisController>>, query: web::Query<ToolCallsQuery>) -> impl Responder {
    let calls = controller.get_tool_calls(query.agent.as_deref(), query.symbol.as_deref()).await;
    HttpResponse::Ok().json(calls)
  }

  async fn get_revision(controller: web::Data<Arc<AnalysisController>>) -> impl Responder {
    let revision: u64 = controller.ui_revision().await;
    HttpResponse::Ok().json(serde_json::json!({"revision": revision}))
  }

  async fn get_stats(controller: web::Data<Arc<AnalysisController>>) -> impl Responder {
    let stats = controller.get_stats().await;
    HttpResponse::Ok().json(stats)
  }
}
