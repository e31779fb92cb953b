//! Serve command and the demo application.

use clap::Args;
use serde_json::{json, Value};
use serverwamp_core::config::Config;
use serverwamp_core::{uri, CapabilityError, Event, RandomIdGenerator, RpcCall, WampError};
use serverwamp_gateway::{procedure, Broker, Capabilities, Gateway, GatewayConfig, RouteSet, RpcRouter};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Serve command arguments.
#[derive(Args)]
pub struct ServeArgs {
    /// Interface to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port number
    #[arg(short, long)]
    pub port: Option<u16>,

    /// HTTP path that upgrades to WAMP
    #[arg(long)]
    pub path: Option<String>,

    /// Agent name advertised in WELCOME
    #[arg(long)]
    pub agent: Option<String>,

    /// Rewrite camelCase kwargs keys to snake_case before dispatch
    #[arg(long)]
    pub snake_case_kwargs: bool,
}

impl ServeArgs {
    /// Overlay command-line flags onto the loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = &self.path {
            config.server.path = path.clone();
        }
        if let Some(agent) = &self.agent {
            config.server.agent_name = agent.clone();
        }
    }
}

/// Run the serve command.
pub async fn run(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let broker = Arc::new(Broker::new());
    let router = RpcRouter::new().with_camel_snake_conversion(args.snake_case_kwargs);
    router.add_routes(demo_routes(broker.clone())).await;

    let procedures = router.list().await;
    info!("Registered procedures: {}", procedures.join(", "));

    let capabilities = Capabilities::new().with_executor(Arc::new(router));
    let gateway =
        Gateway::new(GatewayConfig::from(&config.server), capabilities).with_broker(broker);

    tokio::select! {
        result = gateway.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}

/// Procedures of the demo application.
///
/// - `say_hello()` returns `"hello"`
/// - `delayed_echo(value, delay = 0)` waits `delay` seconds and returns `[value]`
/// - `demo.publish(topic, args...)` publishes to the broker and reports deliveries
pub fn demo_routes(broker: Arc<Broker>) -> RouteSet {
    RouteSet::new()
        .route(
            "say_hello",
            procedure!(|_call: RpcCall| async move { Ok(json!("hello")) }),
        )
        .route(
            "delayed_echo",
            procedure!(|call: RpcCall| async move { delayed_echo(&call).await }),
        )
        .route(
            "demo.publish",
            procedure!(move |call: RpcCall| {
                let broker = broker.clone();
                async move { publish(&broker, &call).await }
            }),
        )
}

async fn delayed_echo(call: &RpcCall) -> Result<Value, CapabilityError> {
    let value = argument(call, 0, "value")
        .cloned()
        .ok_or_else(|| invalid_argument("missing argument 'value'"))?;

    let delay = match argument(call, 1, "delay") {
        None => Duration::ZERO,
        Some(delay) => {
            let seconds = delay
                .as_f64()
                .filter(|d| d.is_finite() && *d >= 0.0)
                .ok_or_else(|| invalid_argument("'delay' must be a non-negative number"))?;
            Duration::try_from_secs_f64(seconds)
                .map_err(|_| invalid_argument("'delay' is out of range"))?
        }
    };

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    Ok(json!([value]))
}

async fn publish(broker: &Broker, call: &RpcCall) -> Result<Value, CapabilityError> {
    let (topic, rest) = call
        .args()
        .split_first()
        .ok_or_else(|| invalid_argument("missing argument 'topic'"))?;
    let topic = topic
        .as_str()
        .ok_or_else(|| invalid_argument("'topic' must be a string"))?;

    let event = Event::new(&RandomIdGenerator)
        .with_args(rest.to_vec())
        .with_kwargs(call.kwargs().clone());
    let delivered = broker.publish(topic, event).await;

    Ok(json!({ "topic": topic, "delivered": delivered }))
}

fn argument<'a>(call: &'a RpcCall, index: usize, name: &str) -> Option<&'a Value> {
    call.kwargs().get(name).or_else(|| call.args().get(index))
}

fn invalid_argument(message: &str) -> CapabilityError {
    WampError::new(uri::INVALID_ARGUMENT)
        .with_args(vec![Value::from(message)])
        .into()
}
