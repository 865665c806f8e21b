// Chat orchestration tests - full turns against scripted servers and providers

#[path = "../support/mod.rs"]
mod support;

use astrolabe_core::application::tooling::RegistryError;
use astrolabe_core::types::{ChatMessage, GenerationParams, MessageRole};
use astrolabe_core::{
    ChatError, ChatOrchestrator, ChatState, CollisionPolicy, ConnectionState, LineInput, TurnReply,
};
use serde_json::json;
use support::{CloseLog, FakeServer, Reply, ScriptedModel};

const SUM_CALL: &str = r#"{"tool": "sum", "arguments": {"a": 40, "b": 2}}"#;

fn forty_two() -> serde_json::Value {
    json!({ "content": [{ "type": "text", "text": "42" }], "isError": false })
}

fn chat(servers: &[&std::sync::Arc<FakeServer>], model: &ScriptedModel) -> ChatOrchestrator {
    ChatOrchestrator::new(
        servers.iter().map(|server| server.connection()).collect(),
        model.backend(),
        GenerationParams::default(),
    )
}

fn roles(history: &[ChatMessage]) -> Vec<MessageRole> {
    history.iter().map(|message| message.role).collect()
}

#[tokio::test]
async fn plain_text_turn_appends_user_and_model() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    let model = ScriptedModel::new(vec![Reply::Text("Olá! Como posso ajudar?")]);
    let mut chat = chat(&[&calc], &model);

    chat.start().await.expect("start");
    let reply = chat.process_turn("olá").await;

    assert_eq!(reply, TurnReply::Answer("Olá! Como posso ajudar?".into()));
    let history = chat.history();
    assert_eq!(
        roles(history),
        vec![MessageRole::Model, MessageRole::User, MessageRole::Model]
    );
    assert_eq!(history[1].content, "olá");
    assert_eq!(history[2].content, "Olá! Como posso ajudar?");
    assert_eq!(chat.state(), ChatState::AwaitingInput);
}

#[tokio::test]
async fn tool_turn_folds_result_and_synthesizes() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    calc.push_result(Ok(forty_two()));
    let model = ScriptedModel::new(vec![Reply::Text(SUM_CALL), Reply::Text("A soma é 42.")]);
    let mut chat = chat(&[&calc], &model);

    chat.start().await.expect("start");
    let reply = chat.process_turn("quanto é 40 + 2?").await;

    assert_eq!(
        reply,
        TurnReply::ToolAnswer {
            dispatch: "Resultado da execução da ferramenta: 42".into(),
            answer: "A soma é 42.".into(),
        }
    );
    let history = chat.history();
    assert_eq!(history.len(), 5);
    assert_eq!(history[2], ChatMessage::model(SUM_CALL));
    assert_eq!(
        history[3],
        ChatMessage::user("Resultado da execução da ferramenta: 42")
    );
    assert_eq!(history[4], ChatMessage::model("A soma é 42."));
    assert_eq!(
        calc.calls(),
        vec![("sum".to_string(), json!({ "a": 40, "b": 2 }))]
    );

    // The synthesis request saw the tool result as its last message.
    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].len(), 4);
}

#[tokio::test]
async fn fenced_tool_call_is_dispatched() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    calc.push_result(Ok(json!("42")));
    let fenced: &'static str = "```json\n{\"tool\": \"sum\", \"arguments\": {\"a\": 40}}\n```";
    let model = ScriptedModel::new(vec![Reply::Text(fenced), Reply::Text("42.")]);
    let mut chat = chat(&[&calc], &model);

    chat.start().await.expect("start");
    chat.process_turn("soma").await;

    assert_eq!(chat.history()[2].content, fenced);
    assert_eq!(
        chat.history()[3].content,
        "Resultado da execução da ferramenta: 42"
    );
}

#[tokio::test]
async fn missing_generation_drops_the_user_turn() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    let model = ScriptedModel::new(vec![Reply::Fail, Reply::Text(""), Reply::Text("Tudo bem.")]);
    let mut chat = chat(&[&calc], &model);

    chat.start().await.expect("start");
    assert_eq!(chat.process_turn("primeira").await, TurnReply::NoResponse);
    assert_eq!(chat.process_turn("segunda").await, TurnReply::NoResponse);
    assert_eq!(chat.history().len(), 1);

    chat.process_turn("terceira").await;
    assert_eq!(chat.history().len(), 3);
    assert_eq!(chat.history()[1].content, "terceira");
}

#[tokio::test]
async fn failed_synthesis_falls_back_to_tool_result() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    calc.push_result(Ok(forty_two()));
    let model = ScriptedModel::new(vec![Reply::Text(SUM_CALL), Reply::Fail]);
    let mut chat = chat(&[&calc], &model);

    chat.start().await.expect("start");
    let reply = chat.process_turn("quanto é 40 + 2?").await;

    assert_eq!(
        reply,
        TurnReply::ToolFallback {
            dispatch: "Resultado da execução da ferramenta: 42".into()
        }
    );
    assert_eq!(chat.history().len(), 5);
    assert_eq!(
        chat.history()[4],
        ChatMessage::model("Resultado da Ferramenta: Resultado da execução da ferramenta: 42")
    );
}

#[tokio::test]
async fn unknown_tool_reports_missing_server() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    let model = ScriptedModel::new(vec![
        Reply::Text(r#"{"tool": "ghost", "arguments": {}}"#),
        Reply::Text("Essa ferramenta não existe."),
    ]);
    let mut chat = chat(&[&calc], &model);

    chat.start().await.expect("start");
    chat.process_turn("use ghost").await;

    assert_eq!(
        chat.history()[3],
        ChatMessage::user("Nenhum servidor encontrado com a ferramenta: ghost")
    );
    assert!(calc.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_tool_retries_become_error_text() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    calc.push_result(Err(astrolabe_core::transport::TransportError::transport(
        "calc", "timeout",
    )));
    calc.push_result(Err(astrolabe_core::transport::TransportError::transport(
        "calc", "still down",
    )));
    let model = ScriptedModel::new(vec![Reply::Text(SUM_CALL), Reply::Text("Falhou.")]);
    let mut chat = chat(&[&calc], &model);

    chat.start().await.expect("start");
    chat.process_turn("soma").await;

    let dispatch = &chat.history()[3].content;
    assert!(dispatch.starts_with("Erro ao executar a ferramenta 'sum': "));
    assert!(dispatch.contains("still down"));
    assert_eq!(calc.calls().len(), 2);
}

#[tokio::test]
async fn invalid_tool_name_is_reported_as_internal_error() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    let model = ScriptedModel::new(vec![
        Reply::Text(r#"{"tool": 12, "arguments": {}}"#),
        Reply::Text("Desculpe."),
    ]);
    let mut chat = chat(&[&calc], &model);

    chat.start().await.expect("start");
    chat.process_turn("?").await;

    assert!(
        chat.history()[3]
            .content
            .starts_with("Ocorreu um erro interno: ")
    );
}

#[tokio::test]
async fn panicking_turn_is_isolated() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    let model = ScriptedModel::new(vec![Reply::Panic, Reply::Text("Recuperado.")]);
    let mut chat = chat(&[&calc], &model);

    chat.start().await.expect("start");
    assert_eq!(chat.process_turn("boom").await, TurnReply::NoResponse);
    assert_eq!(chat.history().len(), 1);
    assert_eq!(chat.state(), ChatState::AwaitingInput);

    assert_eq!(
        chat.process_turn("de novo").await,
        TurnReply::Answer("Recuperado.".into())
    );
}

#[tokio::test]
async fn system_prompt_lists_tools_and_server_instructions() {
    let log = CloseLog::default();
    let calc = FakeServer::with_instructions("calc", &["sum"], &log, "Somente inteiros.");
    let model = ScriptedModel::new(Vec::new());
    let mut chat = chat(&[&calc], &model).with_domain_prompt(Some("Você é um SRE.".into()));

    chat.start().await.expect("start");

    let system = &chat.history()[0];
    assert_eq!(system.role, MessageRole::Model);
    assert!(system.content.starts_with("Você é um SRE.\n\n"));
    assert!(system.content.contains(
        "Tool: sum\nDescription: sum tool\nArguments:\n- a: first operand (required)\n- b: No description\n"
    ));
    assert!(system.content.contains("- calc: Somente inteiros."));
}

#[tokio::test]
async fn startup_failure_cleans_up_in_reverse_order() {
    let log = CloseLog::default();
    let first = FakeServer::new("first", &["a"], &log);
    let second = FakeServer::new("second", &["b"], &log);
    let broken = FakeServer::failing("broken", &log);
    let never = FakeServer::new("never", &["c"], &log);
    let model = ScriptedModel::new(Vec::new());
    let mut chat = chat(&[&first, &second, &broken, &never], &model);

    let err = chat.start().await.expect_err("startup must fail");

    match err {
        ChatError::Startup { server, .. } => assert_eq!(server, "broken"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(chat.state(), ChatState::Ending);
    assert_eq!(*log.lock().unwrap(), vec!["broken", "second", "first"]);
    assert_eq!(never.connects(), 0);
    assert!(chat.history().is_empty());
}

#[tokio::test]
async fn later_server_wins_duplicate_tool_names_by_default() {
    let log = CloseLog::default();
    let first = FakeServer::new("first", &["sum"], &log);
    let second = FakeServer::new("second", &["sum"], &log);
    second.push_result(Ok(json!("2")));
    let model = ScriptedModel::new(vec![Reply::Text(SUM_CALL), Reply::Text("ok")]);
    let mut chat = chat(&[&first, &second], &model);

    chat.start().await.expect("start");
    chat.process_turn("soma").await;

    assert!(first.calls().is_empty());
    assert_eq!(second.calls().len(), 1);
    assert_eq!(chat.registry().tool_names(), vec!["sum"]);
    assert_eq!(chat.history()[0].content.matches("Tool: sum\n").count(), 1);
}

#[tokio::test]
async fn first_wins_policy_keeps_the_earlier_server() {
    let log = CloseLog::default();
    let first = FakeServer::new("first", &["sum"], &log);
    let second = FakeServer::new("second", &["sum"], &log);
    let model = ScriptedModel::new(vec![Reply::Text(SUM_CALL), Reply::Text("ok")]);
    let mut chat = chat(&[&first, &second], &model).with_collision_policy(CollisionPolicy::FirstWins);

    chat.start().await.expect("start");
    chat.process_turn("soma").await;

    assert_eq!(first.calls().len(), 1);
    assert!(second.calls().is_empty());
}

#[tokio::test]
async fn reject_policy_aborts_startup_and_cleans_up() {
    let log = CloseLog::default();
    let first = FakeServer::new("first", &["sum"], &log);
    let second = FakeServer::new("second", &["sum"], &log);
    let model = ScriptedModel::new(Vec::new());
    let mut chat = chat(&[&first, &second], &model).with_collision_policy(CollisionPolicy::Reject);

    let err = chat.start().await.expect_err("collision");

    assert!(matches!(
        err,
        ChatError::Registry(RegistryError::Collision { ref tool, .. }) if tool == "sum"
    ));
    assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
}

#[tokio::test]
async fn run_loop_skips_blank_lines_and_stops_at_exit_keyword() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    let other = FakeServer::new("other", &["echo"], &log);
    let model = ScriptedModel::new(vec![Reply::Text("Olá!")]);
    let mut chat = chat(&[&calc, &other], &model);
    let mut input = LineInput::new("\n   \nolá\nSAIR\nnunca lido\n".as_bytes());
    let mut output: Vec<u8> = Vec::new();

    chat.run(&mut input, &mut output).await.expect("run");

    let transcript = String::from_utf8(output).expect("utf8");
    assert!(transcript.contains("Você: "));
    assert!(transcript.contains("🧠 A pensar..."));
    assert!(transcript.contains("🤖 Assistente: Olá!"));
    assert_eq!(chat.history().len(), 3);
    assert_eq!(model.seen.lock().unwrap().len(), 1);
    assert_eq!(chat.state(), ChatState::Ending);
    assert_eq!(*log.lock().unwrap(), vec!["other", "calc"]);
}

#[tokio::test]
async fn run_loop_reports_turn_faults_and_continues() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    calc.push_result(Ok(forty_two()));
    let model = ScriptedModel::new(vec![
        Reply::Panic,
        Reply::Text(SUM_CALL),
        Reply::Text("A soma é 42."),
    ]);
    let mut chat = chat(&[&calc], &model);
    let mut input = LineInput::new(&b"boom\nquanto?\n"[..]);
    let mut output: Vec<u8> = Vec::new();

    chat.run(&mut input, &mut output).await.expect("run");

    let transcript = String::from_utf8(output).expect("utf8");
    assert!(transcript.contains("Ocorreu um erro: scripted provider exploded."));
    assert!(transcript.contains("✨ A obter a resposta final..."));
    assert!(transcript.contains("✨ Resposta Final do Assistente: A soma é 42."));
    assert_eq!(chat.history().len(), 5);
    assert_eq!(chat.history()[1].content, "quanto?");
    assert_eq!(calc.closes(), 1);
}

#[tokio::test]
async fn run_with_failed_startup_returns_error_after_cleanup() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    let broken = FakeServer::failing("broken", &log);
    let model = ScriptedModel::new(Vec::new());
    let mut chat = chat(&[&calc, &broken], &model);
    let mut input = LineInput::new("olá\n".as_bytes());
    let mut output: Vec<u8> = Vec::new();

    let err = chat.run(&mut input, &mut output).await.expect_err("startup");

    assert!(matches!(err, ChatError::Startup { .. }));
    assert_eq!(calc.closes(), 1);
    assert_eq!(broken.closes(), 1);
    assert!(model.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn connections_are_ready_after_start_and_closed_after_shutdown() {
    let log = CloseLog::default();
    let calc = FakeServer::new("calc", &["sum"], &log);
    let connection = calc.connection();
    let model = ScriptedModel::new(Vec::new());
    let mut chat = ChatOrchestrator::new(
        vec![connection.clone()],
        model.backend(),
        GenerationParams::default(),
    );

    chat.start().await.expect("start");
    assert_eq!(connection.state().await, ConnectionState::Ready);

    chat.shutdown().await;
    chat.shutdown().await;
    assert_eq!(connection.state().await, ConnectionState::Closed);
    assert_eq!(calc.closes(), 1);
}
