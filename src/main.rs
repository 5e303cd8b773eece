use clap::Parser;
use keyturn::cli::{Args, build_config, init_logging, load_jwt_secret, open_database, seed_users};
use keyturn::run_server;
use keyturn::store::{Backend, MemoryBackend};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    match args.database.clone() {
        Some(path) => {
            let Some(db) = open_database(&path).await else {
                std::process::exit(1);
            };
            serve(args, db, jwt_secret).await;
        }
        None => {
            warn!("No database configured, sessions are lost on restart");
            serve(args, MemoryBackend::new(), jwt_secret).await;
        }
    }
}

async fn serve<B: Backend>(args: Args, backend: B, jwt_secret: String) {
    if seed_users(&backend, &args.users).await.is_none() {
        std::process::exit(1);
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = match listener.local_addr() {
        Ok(local_addr) => local_addr,
        Err(e) => {
            error!(error = %e, "Failed to read local address");
            std::process::exit(1);
        }
    };

    let config = build_config(&args, backend, jwt_secret);

    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
