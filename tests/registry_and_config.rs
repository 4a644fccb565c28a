use contentsearch::config::SearcherConfig;
use contentsearch::error::SearchError;
use contentsearch::registry::{self, ExtraKind};

#[test]
fn standard_types_are_registered() {
    let registry = registry::standard();
    let names: Vec<&str> = registry.types().map(|t| t.name()).collect();
    assert_eq!(
        names,
        vec!["user", "content", "page", "file", "module", "comment", "activity", "watch", "vote", "uservariable", "ban", "adminlog"]
    );
    assert_eq!(registry.len(), 12);
    assert!(matches!(registry.resolve("posts"), Err(SearchError::UnknownType(_))));
}

#[test]
fn governance_follows_the_content_model() {
    let registry = registry::standard();
    for governed in ["content", "page", "file", "module", "comment", "activity", "watch", "vote"] {
        assert!(registry.is_permission_governed(governed).expect("type"), "{governed}");
    }
    for open in ["user", "ban", "uservariable", "adminlog"] {
        assert!(!registry.is_permission_governed(open).expect("type"), "{open}");
    }
    let watch = registry.resolve("watch").expect("watch").access();
    assert_eq!((watch.governed_by, watch.owner), (Some("contentId"), Some("userId")));
    assert!(registry.resolve("adminlog").expect("adminlog").access().elevated_only);
}

#[test]
fn field_descriptors_expose_tiers() {
    let registry = registry::standard();
    let keywords = registry.field_descriptor("page", "keywords").expect("keywords");
    assert_eq!((keywords.tier(), keywords.extra()), (2, Some(ExtraKind::Keywords)));
    assert!(!keywords.queryable());
    assert_eq!(registry.field_descriptor("page", "commentCount").expect("count").tier(), 1);
    assert_eq!(registry.field_descriptor("user", "registered").expect("registered").tier(), 0);
    assert!(!registry.field_descriptor("user", "id").expect("id").writable());
    assert!(matches!(registry.field_descriptor("user", "email"), Err(SearchError::UnknownField { .. })));
    assert!(matches!(registry.field_descriptor("user", "salt"), Err(SearchError::UnknownField { .. })));
}

#[test]
fn about_describes_every_type() {
    let about = registry::standard().about();
    let types = about.as_array().expect("array");
    assert_eq!(types.len(), 12);
    let user = &types[0];
    assert_eq!(user["name"], "user");
    let fields = user["fields"].as_array().expect("fields");
    assert!(fields.iter().any(|f| f["name"] == "groups" && f["extra"] == "groups"));
    // hidden fields are still described, just flagged
    assert!(fields.iter().any(|f| f["name"] == "email" && f["selectable"] == false));
}

#[test]
fn config_defaults() {
    let config = SearcherConfig::default();
    assert_eq!(config.max_individual_result_set, 1000);
    assert_eq!(config.permission_cache_seconds, 0);
    assert_eq!(config.pool_size, 4);
    assert_eq!(config.log_filter, "info");
}

#[test]
fn config_reads_a_file_and_sanitizes() {
    let path = std::env::temp_dir().join(format!("contentsearch_config_{}.toml", std::process::id()));
    std::fs::write(&path, "max_individual_result_set = -5\npermission_cache_seconds = 30\npool_size = 0\n").expect("write");
    let config = SearcherConfig::load_from(path.to_str().expect("path")).expect("config");
    assert_eq!(config.max_individual_result_set, 1000);
    assert_eq!(config.permission_cache_seconds, 30);
    assert_eq!(config.pool_size, 1);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let config = SearcherConfig::load_from("definitely_not_here_contentsearch").expect("config");
    assert_eq!(config.database, "contentsearch.db");
}

#[test]
fn request_errors_unwrap_to_their_root() {
    let wrapped = SearchError::in_request("pages", SearchError::UnknownReference("later".into()));
    assert_eq!(wrapped.request_name(), Some("pages"));
    assert!(matches!(wrapped.root(), SearchError::UnknownReference(_)));
    assert!(wrapped.is_caller_error());
    let twice = SearchError::in_request("outer", wrapped);
    assert_eq!(twice.request_name(), Some("pages"));
    assert!(!SearchError::Persistence("disk".into()).is_caller_error());
    assert!(!SearchError::in_request("x", SearchError::Cancelled("x".into())).is_caller_error());
}
