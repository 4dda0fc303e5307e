use crate::connection::{ConnLimits, handle_connection};
use crossbeam_channel::Sender;
use hitcheck_core::config::HitcheckConfig;
use hitcheck_core::handler::CheckHandler;
use hitcheck_core::history::ResultLog;
use monoio::net::TcpListener;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared state across all worker threads.
///
/// The result log is the ONLY shared mutable state.
pub struct SharedState {
    pub log: Arc<ResultLog>,
    pub config: Arc<HitcheckConfig>,
}

impl SharedState {
    pub fn new(log: Arc<ResultLog>, config: HitcheckConfig) -> Arc<Self> {
        Arc::new(Self {
            log,
            config: Arc::new(config),
        })
    }
}

/// Spawn monoio worker threads, one per core.
///
/// Each thread runs an independent monoio runtime with its own
/// TCP listener (via SO_REUSEPORT). Returns once every worker is
/// listening, or with the first startup failure.
pub fn spawn_workers(
    shared: Arc<SharedState>,
    num_workers: usize,
) -> anyhow::Result<Vec<std::thread::JoinHandle<()>>> {
    let listen_addr = shared.config.server.listen_addr.clone();
    let (ready_tx, ready_rx) = crossbeam_channel::bounded(num_workers);
    let mut handles = Vec::with_capacity(num_workers);

    for worker_id in 0..num_workers {
        let shared = Arc::clone(&shared);
        let addr = listen_addr.clone();
        let ready = ready_tx.clone();

        let handle = std::thread::Builder::new()
            .name(format!("hitcheck-worker-{}", worker_id))
            .spawn(move || {
                let mut rt = match monoio::RuntimeBuilder::<monoio::FusionDriver>::new()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready.send(Err(format!("worker {worker_id} runtime: {e}")));
                        return;
                    }
                };

                rt.block_on(worker_loop(worker_id, shared, addr, ready));
            })?;

        handles.push(handle);
    }
    drop(ready_tx);

    for _ in 0..num_workers {
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => anyhow::bail!("worker failed to start: {e}"),
            Err(_) => anyhow::bail!("worker exited before it was ready"),
        }
    }

    info!(workers = num_workers, addr = %listen_addr, "Workers spawned");
    Ok(handles)
}

/// Main loop for a single worker thread.
///
/// Creates ONE CheckHandler for this thread; all connections on the
/// thread share it via Rc.
async fn worker_loop(
    worker_id: usize,
    shared: Arc<SharedState>,
    addr: String,
    ready: Sender<Result<(), String>>,
) {
    let listener = match TcpListener::bind(&addr) {
        Ok(l) => l,
        Err(e) => {
            error!(worker = worker_id, addr = %addr, error = %e, "Bind failed");
            let _ = ready.send(Err(format!("worker {worker_id} bind {addr}: {e}")));
            return;
        }
    };
    info!(worker = worker_id, addr = %addr, "Worker listening");
    let _ = ready.send(Ok(()));

    let handler = Rc::new(CheckHandler::from_config(
        Arc::clone(&shared.log),
        &shared.config,
    ));
    let limits = ConnLimits::from_config(&shared.config.server);

    serve(worker_id, listener, handler, limits).await;
}

/// Accept loop. Never returns; accept and connection errors are logged
/// and the loop keeps serving.
pub async fn serve(
    worker_id: usize,
    listener: TcpListener,
    handler: Rc<CheckHandler>,
    limits: ConnLimits,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let _ = stream.set_nodelay(true);
                let handler = Rc::clone(&handler);

                monoio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer_addr, handler, limits).await {
                        debug!(error = %e, "Connection closed");
                    }
                });
            }
            Err(e) => {
                error!(worker = worker_id, error = %e, "Accept error");
            }
        }
    }
}
