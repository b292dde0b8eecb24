//! End-to-end tests: definitions on disk, real shell, real dispatcher.

#![cfg(unix)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use quill_command::{CommandConfig, CommandPlugin};
use quill_core::{ChannelSink, Dispatcher, Message, Plugin, ScriptRegistry};
use tokio::sync::mpsc::UnboundedReceiver;

fn write(dir: &Path, file: &str, contents: &str) {
    fs::write(dir.join(file), contents).unwrap();
}

async fn start(dir: &Path) -> (CommandPlugin, Dispatcher, UnboundedReceiver<Message>) {
    let mut config = CommandConfig::with_dir(dir);
    config.timeout_secs = 5;
    let plugin = CommandPlugin::new(config);
    let (sink, rx) = ChannelSink::new();
    let dispatcher = Dispatcher::new(Arc::new(ScriptRegistry::new()), Arc::new(sink));
    plugin.on_load(dispatcher.bot()).await.unwrap();
    (plugin, dispatcher, rx)
}

fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<String> {
    let mut texts = Vec::new();
    while let Ok(message) = rx.try_recv() {
        texts.push(message.text);
    }
    texts
}

#[tokio::test]
async fn test_commands_run_in_order_and_stop_at_failure() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "deploy.yml",
        "name: deploy\nrule: \"^!deploy\"\nusage: \"`!deploy`\"\ncmd:\n  - echo A\n  - \"false\"\n  - echo B\n",
    );
    let (_plugin, dispatcher, mut rx) = start(tmp.path()).await;

    let matched = dispatcher
        .dispatch(Message::new("!deploy now", "ops"))
        .await
        .unwrap();

    assert_eq!(matched.script, "cmd");
    assert_eq!(matched.rule, "deploy");
    assert!(matched.failed);
    assert_eq!(
        drain(&mut rx),
        vec!["A\n", r#"error running command: exit status 1: """#]
    );
}

#[tokio::test]
async fn test_invalid_files_skipped_valid_ones_served() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "a.yml", "name: a\nrule: \"^!a$\"\ncmd: [echo a]\n");
    write(tmp.path(), "b.yml", "name: b\nrule: \"^!b$\"\ncmd: [echo b]\n");
    write(tmp.path(), "broken.yml", "name: [\n");
    let (plugin, dispatcher, mut rx) = start(tmp.path()).await;

    assert_eq!(plugin.commands().names(), vec!["a", "b"]);

    dispatcher.dispatch(Message::new("!b", "u")).await.unwrap();
    assert_eq!(drain(&mut rx), vec!["b\n"]);
    assert!(dispatcher.dispatch(Message::new("!broken", "u")).await.is_none());
}

#[tokio::test]
async fn test_refresh_picks_up_changes() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "greet.yml", "name: greet\nrule: \"^!greet\"\ncmd: [echo hello]\n");
    let (_plugin, dispatcher, mut rx) = start(tmp.path()).await;

    write(tmp.path(), "greet.yml", "name: greet\nrule: \"^!greet\"\ncmd: [echo bonjour]\n");
    write(tmp.path(), "bye.yml", "name: bye\nrule: \"^!bye\"\ncmd: [echo ciao]\n");

    dispatcher
        .dispatch(Message::new("!refresh command", "admin"))
        .await
        .unwrap();
    assert_eq!(
        drain(&mut rx),
        vec!["command definitions reloaded (2 commands)"]
    );

    dispatcher.dispatch(Message::new("!greet", "u")).await.unwrap();
    dispatcher.dispatch(Message::new("!bye", "u")).await.unwrap();
    assert_eq!(drain(&mut rx), vec!["bonjour\n", "ciao\n"]);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_commands() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "greet.yml", "name: greet\nrule: \"^!greet\"\ncmd: [echo hello]\n");
    let (plugin, dispatcher, mut rx) = start(tmp.path()).await;

    fs::remove_file(tmp.path().join("greet.yml")).unwrap();
    let matched = dispatcher
        .dispatch(Message::new("!refresh command", "admin"))
        .await
        .unwrap();
    assert!(matched.failed);
    drain(&mut rx);

    assert_eq!(plugin.commands().len(), 1);
    dispatcher.dispatch(Message::new("!greet", "u")).await.unwrap();
    assert_eq!(drain(&mut rx), vec!["hello\n"]);
}

#[tokio::test]
async fn test_slow_command_times_out() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "slow.yml", "name: slow\nrule: \"^!slow\"\ncmd: [sleep 10, echo never]\n");
    let mut config = CommandConfig::with_dir(tmp.path());
    config.timeout_secs = 1;
    let plugin = CommandPlugin::new(config);
    let (sink, mut rx) = ChannelSink::new();
    let dispatcher = Dispatcher::new(Arc::new(ScriptRegistry::new()), Arc::new(sink));
    plugin.on_load(dispatcher.bot()).await.unwrap();

    let matched = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.dispatch(Message::new("!slow", "u")),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(matched.failed);
    assert_eq!(drain(&mut rx), vec!["command timed out after 1s: sleep 10"]);
}

fn versioned_definition(version: u32) -> String {
    format!(
        "name: ver\nrule: \"^!ver$\"\ncmd:\n  - echo v{version} first\n  - echo v{version} second\n"
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refreshes_and_dispatches_see_whole_definitions() {
    const REFRESHERS: usize = 4;
    const CALLERS: usize = 8;
    const ROUNDS: usize = 3;
    const VERSIONS: u32 = 20;

    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "ver.yml", &versioned_definition(0));
    let (_plugin, dispatcher, mut rx) = start(tmp.path()).await;

    // Rename over the live file so a load never reads a half-written one.
    let dir = tmp.path().to_path_buf();
    let rewrites = tokio::spawn(async move {
        for version in 1..=VERSIONS {
            let staged = dir.join("ver.tmp");
            fs::write(&staged, versioned_definition(version)).unwrap();
            fs::rename(&staged, dir.join("ver.yml")).unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let mut tasks = Vec::new();
    for i in 0..REFRESHERS {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            for round in 0..ROUNDS {
                let from = format!("admin{i}-{round}");
                let matched = dispatcher
                    .dispatch(Message::new("!refresh command", from))
                    .await
                    .unwrap();
                assert_eq!(matched.rule, "refresh");
                assert!(!matched.failed);
            }
        }));
    }
    for i in 0..CALLERS {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            for round in 0..ROUNDS {
                let from = format!("user{i}-{round}");
                let matched = dispatcher.dispatch(Message::new("!ver", from)).await.unwrap();
                assert_eq!(matched.rule, "ver");
                assert!(!matched.failed);
            }
        }));
    }
    rewrites.await.unwrap();
    for task in tasks {
        task.await.unwrap();
    }

    let mut replies: HashMap<String, Vec<String>> = HashMap::new();
    while let Ok(message) = rx.try_recv() {
        replies.entry(message.from).or_default().push(message.text);
    }
    for i in 0..REFRESHERS {
        for round in 0..ROUNDS {
            assert_eq!(
                replies[&format!("admin{i}-{round}")],
                vec!["command definitions reloaded (1 commands)"]
            );
        }
    }
    for i in 0..CALLERS {
        for round in 0..ROUNDS {
            let texts = &replies[&format!("user{i}-{round}")];
            assert_eq!(texts.len(), 2, "{texts:?}");
            let version = texts[0].strip_suffix(" first\n").unwrap();
            assert_eq!(texts[1], format!("{version} second\n"));
        }
    }

    dispatcher
        .dispatch(Message::new("!refresh command", "admin"))
        .await
        .unwrap();
    dispatcher.dispatch(Message::new("!ver", "final")).await.unwrap();
    let last: Vec<_> = drain(&mut rx).into_iter().skip(1).collect();
    assert_eq!(last, vec![format!("v{VERSIONS} first\n"), format!("v{VERSIONS} second\n")]);
}
