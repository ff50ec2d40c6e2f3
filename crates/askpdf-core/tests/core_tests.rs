use askpdf_core::config::{
    CompletionProviderKind, Config, DistanceMetric, EmbeddingProviderKind, BYTE_LEVEL_TOKENIZER,
    CL100K_TOKENIZER,
};
use askpdf_core::types::{Answer, SearchResult};
use askpdf_core::Error;
use figment::providers::{Env, Format, Toml};
use figment::{Figment, Jail};

#[test]
fn empty_config_yields_defaults() {
    let config = Config::from_figment(Figment::new());
    let settings = config.settings().expect("settings");
    assert_eq!(settings.tokenizer_id, None);
    assert_eq!(settings.tokenizer_id(), CL100K_TOKENIZER);
    assert_eq!(settings.embedding.provider, EmbeddingProviderKind::OpenAi);
    assert_eq!(settings.embedding.dim, 1536);
    assert_eq!(settings.completion.model, "gpt-3.5-turbo");
    assert_eq!(settings.index.table, "document_embeddings");
}

#[test]
fn toml_and_env_layers_merge() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            tokenizer_id = "models/ada/tokenizer.json"

            [chunking]
            max_tokens = 200
            overlap_tokens = 20

            [embedding]
            provider = "hash"
            dim = 64

            [completion]
            provider = "extractive"

            [index]
            metric = "l2"
            "#,
        )?;
        jail.set_env("APP_INDEX__PATH", "/tmp/askpdf-db");
        jail.set_env("APP_QUERY__TOP_K", "3");

        let figment = Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("APP_").split("__"));
        let settings = Config::from_figment(figment).settings().expect("settings");

        assert_eq!(settings.tokenizer_id(), "models/ada/tokenizer.json");
        assert_eq!(settings.chunking.max_tokens, 200);
        assert_eq!(settings.chunking.overlap_tokens, 20);
        assert_eq!(settings.embedding.provider, EmbeddingProviderKind::Hash);
        assert_eq!(settings.embedding.dim, 64);
        assert_eq!(settings.completion.provider, CompletionProviderKind::Extractive);
        assert_eq!(settings.index.metric, DistanceMetric::L2);
        assert_eq!(settings.index.path, "/tmp/askpdf-db");
        assert_eq!(settings.query.top_k, 3);
        // untouched sections keep their defaults
        assert_eq!(settings.embedding.batch_size, 64);
        Ok(())
    });
}

#[test]
fn hash_provider_defaults_to_byte_level_tokens() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[embedding]\nprovider = \"hash\"\ndim = 32\n")?;
        let config = Config::from_figment(Figment::new().merge(Toml::file("config.toml")));
        let settings = config.settings().expect("settings");
        assert_eq!(settings.tokenizer_id(), BYTE_LEVEL_TOKENIZER);
        Ok(())
    });
}

#[test]
fn invalid_window_is_rejected_at_load() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[chunking]\nmax_tokens = 10\noverlap_tokens = 10\n")?;
        let config = Config::from_figment(Figment::new().merge(Toml::file("config.toml")));
        assert!(matches!(config.settings(), Err(Error::InvalidConfig(_))));
        Ok(())
    });
}

#[test]
fn get_reads_single_keys() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[index]\ntable = \"pdf_chunks\"\n")?;
        let config = Config::from_figment(Figment::new().merge(Toml::file("config.toml")));
        let table: String = config.get("index.table").expect("table");
        assert_eq!(table, "pdf_chunks");
        assert!(config.get::<String>("index.missing").is_err());
        Ok(())
    });
}

#[test]
fn answer_serializes_to_wire_shape() {
    let answer = Answer {
        answer: "Under the oak tree.".to_string(),
        context: vec![SearchResult { text: "The treasure is under the oak tree.".to_string(), score: 0.5 }],
    };
    let json = serde_json::to_value(&answer).expect("json");
    assert_eq!(json["answer"], "Under the oak tree.");
    assert_eq!(json["context"][0]["text"], "The treasure is under the oak tree.");
    assert_eq!(json["context"][0]["score"], 0.5);
}
