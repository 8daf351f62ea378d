use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use parcelas::{
    auth::SessionKeys,
    config::Config,
    routes,
    store::MongoStore,
    tracker::ExpenseTracker,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().map_err(|err| {
        error!("{}", err);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err)
    })?;
    info!("Using database {}", config.database);

    let store = MongoStore::connect(&config.mongodb_uri, &config.database)
        .await
        .map_err(|err| {
            error!("Failed to connect: {}", err);
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, err)
        })?;

    let tracker = web::Data::new(ExpenseTracker::new(store));
    let keys = web::Data::new(SessionKeys::new(&config.session_secret, config.session_max_age));
    let allowed_origin = config.allowed_origin.clone();

    info!("Listening on {}:{}", config.bind_address, config.port);
    HttpServer::new(move || {
        let cors = match &allowed_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                .allow_any_header(),
            None => Cors::permissive(),
        };
        App::new()
            .wrap(cors)
            .app_data(tracker.clone())
            .app_data(keys.clone())
            .configure(routes::configure::<MongoStore>)
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await
}
