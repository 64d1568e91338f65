use super::*;

#[test]
fn default_model_tracks_provider() {
    assert_eq!(default_model_for(Provider::Ollama), DEFAULT_OLLAMA_CHAT_MODEL);
    assert_eq!(default_model_for(Provider::OpenAi), DEFAULT_OPENAI_CHAT_MODEL);
}

#[test]
fn connection_test_fails_against_unused_port() {
    let ollama = OllamaConfig {
        host: "127.0.0.1".to_string(),
        // Reserved port, nothing listens here
        port: 1,
        ..OllamaConfig::default()
    };
    assert!(!test_ollama_connection(&ollama));
}
