//! Runtime orchestration.
//!
//! The runtime owns the [`ScriptRegistry`], bootstraps plugins into it, and
//! drives a bounded inbound queue: each message is dispatched on its own task
//! so a slow command never holds up other senders.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use quill_runtime::QuillRuntime;
//!
//! let runtime = QuillRuntime::builder()
//!     .config_file("quill.toml")
//!     .build()?;
//!
//! runtime.register_configured::<CommandPlugin>().await?;
//!
//! let (tx, rx) = runtime.inbound_channel();
//! let (sink, replies) = ChannelSink::new();
//! runtime.serve(rx, Arc::new(sink)).await?;
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use quill_core::{
    Bot, BoxedOutgoing, BoxedPlugin, ConfigurablePlugin, Dispatcher, Message, Plugin,
    PluginError, ScriptRegistry,
};
use tokio::signal;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, ConfigResult, QuillConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::help::{HELP_SCRIPT, help_script};
use crate::logging;

/// Hosts plugins and dispatches inbound messages against their scripts.
pub struct QuillRuntime {
    config: QuillConfig,
    registry: Arc<ScriptRegistry>,
    plugins: RwLock<Vec<BoxedPlugin>>,
    /// Set once `start` has bootstrapped every plugin.
    dispatcher: Mutex<Option<Dispatcher>>,
    shutdown: CancellationToken,
}

impl QuillRuntime {
    /// Creates a runtime from the default configuration locations.
    ///
    /// Falls back to built-in defaults when loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .with_user_config_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                QuillConfig::default()
            });

        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration and initializes logging.
    pub fn from_config(config: &QuillConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            help = config.dispatch.help,
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            registry: Arc::new(ScriptRegistry::new()),
            plugins: RwLock::new(Vec::new()),
            dispatcher: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &QuillConfig {
        &self.config
    }

    /// The registry shared by every plugin and dispatch.
    pub fn registry(&self) -> &Arc<ScriptRegistry> {
        &self.registry
    }

    /// Queues a plugin; plugins load in registration order on `start`.
    pub async fn register_plugin<P>(&self, plugin: P)
    where
        P: Plugin + 'static,
    {
        self.register_boxed(Arc::new(plugin)).await;
    }

    pub async fn register_boxed(&self, plugin: BoxedPlugin) {
        info!(plugin = plugin.name(), "Registered plugin");
        self.plugins.write().await.push(plugin);
    }

    /// Builds `P` from its `plugins.<name>` section and queues it.
    ///
    /// Uses `P::Config::default()` when the section is absent.
    pub async fn register_configured<P>(&self) -> RuntimeResult<()>
    where
        P: ConfigurablePlugin + 'static,
    {
        let name = P::plugin_name();

        let config: P::Config = match self.config.plugin(name) {
            Some(section) if !section.is_null() => serde_json::from_value(section.clone())
                .map_err(|e| PluginError::invalid_config(name, e.to_string()))?,
            _ => {
                warn!(
                    plugin = name,
                    "No configuration found for plugin, using default"
                );
                P::Config::default()
            }
        };

        self.register_plugin(P::from_config(config)?).await;
        Ok(())
    }

    pub async fn plugin_count(&self) -> usize {
        self.plugins.read().await.len()
    }

    /// A bounded inbound queue sized by `dispatch.queue_capacity`.
    pub fn inbound_channel(&self) -> (mpsc::Sender<Message>, mpsc::Receiver<Message>) {
        mpsc::channel(self.config.dispatch.queue_capacity.max(1))
    }

    /// Token that stops [`serve`](Self::serve) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops a running `serve` loop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Registers the help script and bootstraps every plugin.
    ///
    /// A plugin error aborts startup: scripts registered during this call are
    /// unregistered again and the runtime stays unstarted.
    pub async fn start(&self, outgoing: BoxedOutgoing) -> RuntimeResult<Dispatcher> {
        let mut slot = self.dispatcher.lock().await;
        if slot.is_some() {
            return Err(RuntimeError::AlreadyStarted);
        }

        let bot = Bot::new(Arc::clone(&self.registry), outgoing);
        let preexisting: HashSet<String> = self.registry.script_names().into_iter().collect();

        if self.config.dispatch.help {
            self.registry
                .register(HELP_SCRIPT, help_script(self.config.dispatch.help_trigger.clone()));
        }

        let plugins = self.plugins.read().await;
        for plugin in plugins.iter() {
            debug!(plugin = plugin.name(), "Loading plugin");
            if let Err(e) = plugin.on_load(&bot).await {
                error!(plugin = plugin.name(), error = %e, "Plugin failed to load");
                for name in self.registry.script_names() {
                    if !preexisting.contains(&name) {
                        self.registry.unregister(&name);
                    }
                }
                return Err(e.into());
            }
            info!(plugin = plugin.name(), "Plugin loaded");
        }

        let dispatcher = Dispatcher::from_bot(bot);
        *slot = Some(dispatcher.clone());

        info!(
            plugins = plugins.len(),
            scripts = self.registry.len(),
            "Runtime started"
        );
        Ok(dispatcher)
    }

    pub async fn is_started(&self) -> bool {
        self.dispatcher.lock().await.is_some()
    }

    /// The dispatcher created by `start`.
    pub async fn dispatcher(&self) -> RuntimeResult<Dispatcher> {
        self.dispatcher
            .lock()
            .await
            .clone()
            .ok_or(RuntimeError::NotStarted)
    }

    /// Starts the runtime and dispatches inbound messages until shutdown.
    ///
    /// Stops on Ctrl+C, SIGTERM, [`shutdown`](Self::shutdown), or when every
    /// inbound sender is dropped, then waits for in-flight dispatches.
    pub async fn serve(
        &self,
        inbound: mpsc::Receiver<Message>,
        outgoing: BoxedOutgoing,
    ) -> RuntimeResult<()> {
        self.start(outgoing).await?;
        self.serve_until(inbound, wait_for_shutdown_signal()).await
    }

    /// Like [`serve`](Self::serve) on an already started runtime, with a
    /// custom shutdown future instead of process signals.
    pub async fn serve_until<F>(
        &self,
        mut inbound: mpsc::Receiver<Message>,
        shutdown: F,
    ) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let dispatcher = self.dispatcher().await?;
        let tracker = TaskTracker::new();
        tokio::pin!(shutdown);

        info!("Quill runtime is now serving. Press Ctrl+C to stop.");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = &mut shutdown => break,
                next = inbound.recv() => match next {
                    Some(message) => {
                        let dispatcher = dispatcher.clone();
                        tracker.spawn(async move {
                            dispatcher.dispatch(message).await;
                        });
                    }
                    None => {
                        info!("Inbound channel closed");
                        break;
                    }
                },
            }
        }

        tracker.close();
        debug!(in_flight = tracker.len(), "Waiting for in-flight dispatches");
        tracker.wait().await;

        info!("Runtime stopped");
        Ok(())
    }
}

impl Default for QuillRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// A signal that cannot be listened for is logged and never fires.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`QuillRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new()
                .with_current_dir()
                .with_user_config_dir(),
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: QuillConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn build(self) -> ConfigResult<QuillRuntime> {
        let config = self.config_loader.load()?;
        Ok(QuillRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use quill_core::{ChannelSink, PluginResult, Script};

    use super::*;

    struct PingPlugin {
        loads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Plugin for PingPlugin {
        fn name(&self) -> &str {
            "ping"
        }

        async fn on_load(&self, bot: &Bot) -> PluginResult<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            bot.registry().register(
                "ping",
                Script::new(|_bot: Bot, incoming: Message| async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(vec![incoming.reply("pong")])
                })
                .rule("ping", "^!ping$"),
            );
            Ok(())
        }
    }

    struct BrokenPlugin;

    #[async_trait]
    impl Plugin for BrokenPlugin {
        fn name(&self) -> &str {
            "broken"
        }

        async fn on_load(&self, _bot: &Bot) -> PluginResult<()> {
            Err(PluginError::load_failed("broken", "no luck"))
        }
    }

    #[derive(Debug, Default, serde::Deserialize)]
    struct GreeterConfig {
        #[serde(default)]
        greeting: String,
    }

    struct Greeter {
        greeting: String,
    }

    #[async_trait]
    impl Plugin for Greeter {
        fn name(&self) -> &str {
            "greeter"
        }

        async fn on_load(&self, _bot: &Bot) -> PluginResult<()> {
            debug!(greeting = %self.greeting, "Greeter loaded");
            Ok(())
        }
    }

    impl ConfigurablePlugin for Greeter {
        type Config = GreeterConfig;

        fn plugin_name() -> &'static str {
            "greeter"
        }

        fn from_config(config: GreeterConfig) -> PluginResult<Self> {
            if config.greeting == "forbidden" {
                return Err(PluginError::invalid_config("greeter", "forbidden greeting"));
            }
            Ok(Self {
                greeting: config.greeting,
            })
        }
    }

    fn runtime() -> QuillRuntime {
        QuillRuntime::from_config(&QuillConfig::default())
    }

    #[tokio::test]
    async fn test_start_loads_plugins_and_help() {
        let runtime = runtime();
        let loads = Arc::new(AtomicUsize::new(0));
        runtime
            .register_plugin(PingPlugin {
                loads: Arc::clone(&loads),
            })
            .await;
        let (sink, _rx) = ChannelSink::new();

        runtime.start(Arc::new(sink.clone())).await.unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.registry().script_names(), vec!["help", "ping"]);
        assert!(matches!(
            runtime.start(Arc::new(sink)).await,
            Err(RuntimeError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_plugin_failure_aborts_start() {
        let runtime = runtime();
        runtime.register_plugin(BrokenPlugin).await;
        let (sink, _rx) = ChannelSink::new();

        let result = runtime.start(Arc::new(sink)).await;

        assert!(matches!(result, Err(RuntimeError::Plugin(_))));
        assert!(!runtime.is_started().await);
        assert!(matches!(
            runtime.dispatcher().await,
            Err(RuntimeError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_failed_start_unregisters_scripts_it_added() {
        let runtime = runtime();
        runtime.registry().register(
            "external",
            Script::new(|_bot: Bot, _incoming: Message| async move { Ok(Vec::new()) })
                .rule("external", "^!external$"),
        );
        runtime
            .register_plugin(PingPlugin {
                loads: Arc::new(AtomicUsize::new(0)),
            })
            .await;
        runtime.register_plugin(BrokenPlugin).await;
        let (sink, _rx) = ChannelSink::new();

        let result = runtime.start(Arc::new(sink)).await;

        assert!(matches!(result, Err(RuntimeError::Plugin(_))));
        assert_eq!(runtime.registry().script_names(), vec!["external"]);
    }

    #[tokio::test]
    async fn test_register_configured_reads_section() {
        let mut config = QuillConfig::default();
        config
            .plugins
            .insert("greeter".into(), serde_json::json!({ "greeting": "hi" }));
        let runtime = QuillRuntime::from_config(&config);

        runtime.register_configured::<Greeter>().await.unwrap();
        assert_eq!(runtime.plugin_count().await, 1);

        let mut config = QuillConfig::default();
        config
            .plugins
            .insert("greeter".into(), serde_json::json!({ "greeting": "forbidden" }));
        let runtime = QuillRuntime::from_config(&config);
        assert!(matches!(
            runtime.register_configured::<Greeter>().await,
            Err(RuntimeError::Plugin(PluginError::InvalidConfig { .. }))
        ));
    }

    #[tokio::test]
    async fn test_register_configured_defaults_when_absent() {
        let runtime = runtime();
        runtime.register_configured::<Greeter>().await.unwrap();
        assert_eq!(runtime.plugin_count().await, 1);
    }

    #[tokio::test]
    async fn test_serve_dispatches_until_inbound_closes() {
        let runtime = runtime();
        runtime
            .register_plugin(PingPlugin {
                loads: Arc::new(AtomicUsize::new(0)),
            })
            .await;
        let (sink, mut rx) = ChannelSink::new();
        runtime.start(Arc::new(sink)).await.unwrap();

        let (tx, inbound) = runtime.inbound_channel();
        for i in 0..5 {
            tx.send(Message::new("!ping", format!("user{i}"))).await.unwrap();
        }
        tx.send(Message::new("no match", "nobody")).await.unwrap();
        drop(tx);

        runtime
            .serve_until(inbound, std::future::pending())
            .await
            .unwrap();

        // In-flight dispatches finished before serve returned.
        let mut senders = Vec::new();
        while let Ok(reply) = rx.try_recv() {
            assert_eq!(reply.text, "pong");
            senders.push(reply.from);
        }
        senders.sort();
        assert_eq!(senders, vec!["user0", "user1", "user2", "user3", "user4"]);
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_serve() {
        let runtime = Arc::new(runtime());
        let (sink, _rx) = ChannelSink::new();
        runtime.start(Arc::new(sink)).await.unwrap();
        let (_tx, inbound) = runtime.inbound_channel();

        let token = runtime.shutdown_token();
        let serving = {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move { runtime.serve_until(inbound, std::future::pending()).await })
        };
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), serving)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_serve_before_start_fails() {
        let runtime = runtime();
        let (_tx, inbound) = runtime.inbound_channel();
        assert!(matches!(
            runtime.serve_until(inbound, std::future::pending()).await,
            Err(RuntimeError::NotStarted)
        ));
    }
}
