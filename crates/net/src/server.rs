//! In-process query server for tests
//!
//! Speaks just enough of the protocol to drive a [`Client`](crate::Client):
//! greets with a banner, answers a fixed set of commands, and can push
//! notification lines to every connected session.

use std::net::SocketAddr;
use std::sync::Arc;

use squery_core::notify::first_token;
use squery_core::{escape, WireMap};
use tokio::io::BufReader;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info};

use crate::error::Result;
use crate::frame::{read_line, write_line};

const BANNER: [&str; 2] = [
    "TS3",
    "Welcome to the query interface, type \"help\" for a list of commands.",
];

const USERNAME: &str = "serveradmin";
const PASSWORD: &str = "secret";
const CHANNEL_ID: u32 = 5;

/// Server state shared across connections
#[derive(Default)]
struct ServerState {
    roster: Vec<String>,
    registered: Vec<String>,
    commands: Vec<String>,
}

pub(crate) struct FakeServer {
    addr: SocketAddr,
    state: Arc<RwLock<ServerState>>,
    notify_tx: broadcast::Sender<String>,
    shutdown_tx: broadcast::Sender<()>,
}

impl FakeServer {
    /// Start on a random local port
    pub(crate) async fn start() -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, _) = broadcast::channel(1);
        let (notify_tx, _) = broadcast::channel(16);
        let state = Arc::new(RwLock::new(ServerState::default()));

        tokio::spawn(accept_loop(
            listener,
            state.clone(),
            notify_tx.clone(),
            shutdown_tx.subscribe(),
        ));
        info!(addr = %addr, "Fake query server started");

        Ok(Self {
            addr,
            state,
            notify_tx,
            shutdown_tx,
        })
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Replace the rows returned by `clientlist`
    pub(crate) async fn set_roster(&self, rows: &[&str]) {
        self.state.write().await.roster = rows.iter().map(|r| r.to_string()).collect();
    }

    /// Push a raw notification line to every session
    pub(crate) async fn notify(&self, line: &str) {
        let _ = self.notify_tx.send(line.to_string());
    }

    /// Arguments of every accepted `servernotifyregister`, e.g. `channel id=5`
    pub(crate) async fn registered(&self) -> Vec<String> {
        self.state.read().await.registered.clone()
    }

    /// How many times a command has been received
    pub(crate) async fn count_commands(&self, name: &str) -> usize {
        self.state
            .read()
            .await
            .commands
            .iter()
            .filter(|c| c.as_str() == name)
            .count()
    }

    /// Stop accepting and close every session
    pub(crate) fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<RwLock<ServerState>>,
    notify_tx: broadcast::Sender<String>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(
                            stream,
                            state.clone(),
                            notify_tx.subscribe(),
                            shutdown_rx.resubscribe(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("Accept loop shutting down");
                break;
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<RwLock<ServerState>>,
    mut notify_rx: broadcast::Receiver<String>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let (line_tx, line_rx) = mpsc::channel(64);
    let writer_handle = tokio::spawn(writer_task(writer, line_rx));

    for line in BANNER {
        let _ = line_tx.send(line.to_string()).await;
    }

    loop {
        tokio::select! {
            result = read_line(&mut reader) => {
                let Ok(Some(line)) = result else {
                    break;
                };
                for reply in respond(&line, &state).await {
                    let _ = line_tx.send(reply).await;
                }
            }
            notification = notify_rx.recv() => {
                if let Ok(line) = notification {
                    let _ = line_tx.send(line).await;
                }
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    drop(line_tx);
    let _ = writer_handle.await;
    debug!("Session closed");
}

async fn writer_task(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<String>) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = write_line(&mut writer, &line).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

fn ok() -> String {
    "error id=0 msg=ok".to_string()
}

fn failure(code: i32, message: &str) -> String {
    format!("error id={} msg={}", code, escape(message))
}

/// Build the reply lines for one command
async fn respond(line: &str, state: &Arc<RwLock<ServerState>>) -> Vec<String> {
    let name = first_token(line).to_ascii_lowercase();
    let args = WireMap::parse(line.get(name.len()..).unwrap_or(""));

    let mut state = state.write().await;
    state.commands.push(name.clone());

    match name.as_str() {
        "login" => {
            if args.get("client_login_name") == Some(USERNAME)
                && args.get("client_login_password") == Some(PASSWORD)
            {
                vec![ok()]
            } else {
                vec![failure(520, "invalid loginname or password")]
            }
        }
        "use" => match args.get_int("sid") {
            Some(_) => vec![ok()],
            None => vec![failure(1538, "invalid parameter")],
        },
        "whoami" => vec![
            format!(
                "virtualserver_status=online virtualserver_id=1 client_channel_id={} client_nickname={} client_id=1",
                CHANNEL_ID, USERNAME
            ),
            ok(),
        ],
        "clientlist" => {
            let mut reply = Vec::new();
            if !state.roster.is_empty() {
                reply.push(state.roster.join("|"));
            }
            reply.push(ok());
            reply
        }
        "servernotifyregister" => {
            let Some(event) = args.get("event").map(str::to_string) else {
                return vec![failure(1538, "invalid parameter")];
            };
            let entry = match args.get("id") {
                Some(id) => format!("{} id={}", event, id),
                None => event,
            };
            state.registered.push(entry);
            vec![ok()]
        }
        "echo" => vec![args.to_string(), ok()],
        _ => vec![failure(256, "command not found")],
    }
}
