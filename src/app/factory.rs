use actix_web::{web, App};
use std::sync::Arc;

use crate::app::config::Config;
use crate::app::routes::routes::Routes;
use crate::app::state::registry::AppRegistry;

use super::controller::analysis_controllers::AnalysisController;
use super::services::analysis_service::AnalysisService;

#[derive(Clone)]
pub struct AppState {
  pub analysis_controller: Arc<AnalysisController>,
}

impl AppState {

  pub fn new(app_config: &Config, registry: Arc<AppRegistry>) -> Self {
    let analysis_service: Arc<AnalysisService> = Arc::new(AnalysisService::new(app_config.clone(), registry));
    let analysis_controller: Arc<AnalysisController> = Arc::new(AnalysisController::new(analysis_service));
    AppState { analysis_controller }
  }
}

pub struct CreateApp {
  app_state: AppState,
  #[allow(unused)]
  app_settings: Config,
}

impl CreateApp {

  pub fn new(app_settings: Config, registry: Arc<AppRegistry>) -> Self {
    let app_state: AppState = AppState::new(&app_settings, registry);
    CreateApp { app_state, app_settings }
  }

  pub fn build_app(&self,) -> App<impl actix_web::dev::ServiceFactory<actix_web::dev::ServiceRequest,Config = (),Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,Error = actix_web::Error,InitError = (),>,> {
    App::new()
    .app_data(web::Data::new(self.app_state.analysis_controller.clone()))
    .configure(Routes::configure)
  }
}
