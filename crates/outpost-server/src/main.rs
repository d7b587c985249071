//! outpost server entry point: boots the database, the `ActivityPub` HTTP
//! surface, the federation workers, and the Gemini-style text listener as
//! one process (spec.md §1/§5 — "a single process owns a single database
//! file").

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::Duration as ChronoDuration;
use outpost_common::Config;
use outpost_core::services::{
    AudienceService, FeedService, FollowingService, HashtagService, NoteService, OutboxDelivery,
    PollService, ShareService,
};
use outpost_db::repositories::{
    DeliveryRepository, FeedRepository, FollowRequestRepository, FollowingRepository,
    HashtagRepository, InboxRepository, NoteRepository, OutboxRepository, PersonKeypairRepository,
    PersonRepository, PollRepository, PollVoteRepository, ShareRepository,
};
use outpost_federation::{
    cache::RemoteActorCache,
    client::ApClient,
    handler::{
        followers_handler, following_handler, inbox_handler, nodeinfo_2_1, outbox_handler,
        user_handler, user_inbox_handler, webfinger_handler, well_known_nodeinfo, CollectionState,
        InboxState, NodeInfoState, UserApState, WebfingerState,
    },
};
use outpost_queue::{dispatcher::DispatchContext, retry::RetryConfig, workers::{DeliveryWorker, InboxPoller, PollPoller}};
use outpost_text::TextContext;
use sea_orm::DatabaseConnection;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal(cancel: watch::Sender<bool>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
    let _ = cancel.send(true);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outpost=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting outpost server...");

    let config = Config::load()?;

    let db = outpost_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    outpost_db::migrate(&db).await?;
    info!("Migrations completed");

    let db: Arc<DatabaseConnection> = Arc::new(db);

    let base_url = Url::parse(&format!("https://{}", config.federation.domain))?;
    let server_url = base_url.to_string().trim_end_matches('/').to_string();

    // === Repositories ===
    let person_repo = PersonRepository::new(Arc::clone(&db));
    let keypair_repo = PersonKeypairRepository::new(Arc::clone(&db));
    let note_repo = NoteRepository::new(Arc::clone(&db));
    let following_repo = FollowingRepository::new(Arc::clone(&db));
    let follow_request_repo = FollowRequestRepository::new(Arc::clone(&db));
    let hashtag_repo = HashtagRepository::new(Arc::clone(&db));
    let feed_repo = FeedRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let poll_vote_repo = PollVoteRepository::new(Arc::clone(&db));
    let share_repo = ShareRepository::new(Arc::clone(&db));
    let outbox_repo = OutboxRepository::new(Arc::clone(&db));
    let delivery_repo = DeliveryRepository::new(Arc::clone(&db));
    let inbox_repo = InboxRepository::new(Arc::clone(&db));

    // === Federation client and cache ===
    let ap_client = Arc::new(ApClient::new(&server_url));
    let remote_cache = RemoteActorCache::new();

    // === Delivery and core services ===
    let delivery: outpost_core::services::DeliveryService = Arc::new(OutboxDelivery::new(
        outbox_repo.clone(),
        delivery_repo.clone(),
    ));

    let note_service = NoteService::new(
        note_repo.clone(),
        person_repo.clone(),
        following_repo.clone(),
        hashtag_repo.clone(),
        share_repo.clone(),
        ChronoDuration::from_std(config.federation.post_throttle_unit)
            .unwrap_or_else(|_| ChronoDuration::seconds(1)),
        ChronoDuration::from_std(config.federation.edit_throttle_unit)
            .unwrap_or_else(|_| ChronoDuration::seconds(1)),
        config.federation.max_posts_length,
        config.federation.max_recipients,
    )
    .with_delivery(delivery.clone(), server_url.clone());

    let following_service = FollowingService::with_delivery(
        following_repo.clone(),
        follow_request_repo.clone(),
        person_repo.clone(),
        delivery.clone(),
        server_url.clone(),
    );

    let poll_service = PollService::new(poll_repo.clone(), poll_vote_repo.clone());

    let hashtag_service = HashtagService::new(hashtag_repo.clone(), note_repo.clone());

    let feed_service = FeedService::new(feed_repo, following_repo.clone(), note_repo.clone());

    let audience_service = AudienceService::new(following_repo.clone());

    let share_service = ShareService::new(
        share_repo.clone(),
        note_repo.clone(),
        person_repo.clone(),
        following_repo.clone(),
        ChronoDuration::from_std(config.federation.share_throttle_unit)
            .unwrap_or_else(|_| ChronoDuration::seconds(1)),
    )
    .with_delivery(delivery.clone(), server_url.clone());

    // === Federation dispatch context (inbox admission, shared by InboxPoller) ===
    let block_list: HashSet<String> = config.federation.load_block_list().unwrap_or_else(|e| {
        warn!(error = %e, "failed to load block list, continuing with an empty one");
        HashSet::new()
    });

    let dispatch_ctx = DispatchContext::new(
        person_repo.clone(),
        note_repo.clone(),
        poll_repo.clone(),
        poll_vote_repo.clone(),
        following_repo.clone(),
        follow_request_repo.clone(),
        share_repo.clone(),
        hashtag_repo.clone(),
        following_service.clone(),
        poll_service.clone(),
        feed_service.clone(),
        delivery.clone(),
        Arc::clone(&ap_client),
        Arc::new(block_list),
        config.federation.max_forwarding_depth,
        config.federation.accept_forwarded_deletes,
    );

    // === ActivityPub HTTP surface ===
    let webfinger_state = WebfingerState::new(
        config.federation.domain.clone(),
        person_repo.clone(),
        base_url.clone(),
    );
    let nodeinfo_state = NodeInfoState::new(
        base_url.clone(),
        config.federation.domain.clone(),
        String::new(),
        env!("CARGO_PKG_VERSION").to_string(),
        person_repo.clone(),
        note_repo.clone(),
    );
    let user_ap_state = UserApState::new(person_repo.clone(), keypair_repo.clone(), base_url.clone());
    let collection_state = CollectionState::new(
        person_repo.clone(),
        note_repo.clone(),
        following_repo.clone(),
        poll_repo.clone(),
        base_url.clone(),
    );
    let inbox_state = InboxState {
        person_repo: person_repo.clone(),
        inbox_repo: inbox_repo.clone(),
        cache: remote_cache,
        client: Arc::clone(&ap_client),
    };

    let app = Router::new()
        .route(
            "/.well-known/webfinger",
            get(webfinger_handler).with_state(webfinger_state),
        )
        .route(
            "/.well-known/nodeinfo",
            get(well_known_nodeinfo).with_state(nodeinfo_state.clone()),
        )
        .route("/nodeinfo/2.1", get(nodeinfo_2_1).with_state(nodeinfo_state))
        .route("/users/{username}", get(user_handler).with_state(user_ap_state))
        .route(
            "/users/{username}/outbox",
            get(outbox_handler).with_state(collection_state.clone()),
        )
        .route(
            "/users/{username}/followers",
            get(followers_handler).with_state(collection_state.clone()),
        )
        .route(
            "/users/{username}/following",
            get(following_handler).with_state(collection_state),
        )
        .route("/inbox", post(inbox_handler).with_state(inbox_state.clone()))
        .route(
            "/users/{username}/inbox",
            post(user_inbox_handler).with_state(inbox_state),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // === Background workers ===
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let inbox_poller = InboxPoller {
        inbox_repo: inbox_repo.clone(),
        dispatch_ctx,
        poll_interval: std::time::Duration::from_secs(1),
        lease_secs: 30,
        batch_size: 16,
        retry: RetryConfig {
            max_retries: config.federation.delivery_retry_max,
            ..RetryConfig::default()
        },
    };
    tokio::spawn(inbox_poller.run(cancel_rx.clone()));

    for worker_id in 0..config.federation.delivery_workers.max(1) {
        let delivery_worker = DeliveryWorker {
            delivery_repo: delivery_repo.clone(),
            outbox_repo: outbox_repo.clone(),
            keypair_repo: keypair_repo.clone(),
            client: Arc::clone(&ap_client),
            retry: RetryConfig {
                max_retries: config.federation.delivery_retry_max,
                ..RetryConfig::default()
            },
            poll_interval: std::time::Duration::from_secs(2),
            lease_secs: 60,
            batch_size: 16,
        };
        info!(worker_id, "starting delivery worker");
        tokio::spawn(delivery_worker.run(cancel_rx.clone()));
    }

    let poll_poller = PollPoller {
        poll_repo: poll_repo.clone(),
        poll_interval: std::time::Duration::from_secs(30),
    };
    tokio::spawn(poll_poller.run(cancel_rx.clone()));

    // === Gemini-style text interface ===
    let text_ctx = TextContext {
        note_service,
        following_service,
        poll_service,
        hashtag_service,
        feed_service,
        audience_service,
        share_service,
        person_repo,
        note_repo,
        ap_client,
        domain: config.federation.domain.clone(),
        max_bio_length: config.federation.max_bio_length,
    };
    let text_addr = SocketAddr::from(([0, 0, 0, 0], config.server.text_port));
    tokio::spawn(run_text_listener(text_ctx, text_addr, cancel_rx.clone()));

    // === HTTP server with graceful shutdown ===
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_tx))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Accepts plain-TCP connections on the Gemini-style text port, reads one
/// request line per connection, and writes back a rendered [`Response`].
///
/// spec.md §1 scopes the TLS listener and client-certificate → local-actor
/// mapping as an external collaborator "reimplemented straightforwardly
/// once the core is correct." This listener is that straightforward
/// placeholder: every connection is anonymous (`caller = None`), so
/// authenticated `/users/*` verbs always answer "Authentication required"
/// until a TLS front end that resolves a client certificate to a
/// `person::Model` is wired in ahead of it.
async fn run_text_listener(ctx: TextContext, addr: SocketAddr, mut cancel: watch::Receiver<bool>) {
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "text listener: failed to bind");
            return;
        }
    };
    info!(%addr, "text listener: listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "text listener: accept failed");
                        continue;
                    }
                };
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_text_connection(&ctx, socket).await {
                        warn!(error = %e, %peer, "text listener: connection failed");
                    }
                });
            }
            result = cancel.changed() => {
                if result.is_err() || *cancel.borrow() {
                    break;
                }
            }
        }
    }
    info!("text listener: stopped");
}

async fn serve_text_connection(
    ctx: &TextContext,
    mut socket: tokio::net::TcpStream,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = socket.split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let response = outpost_text::route(ctx, None, line.trim_end()).await;
    write_half.write_all(response.render().as_bytes()).await?;
    write_half.flush().await
}
