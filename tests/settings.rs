use std::fs;

use sc_pattern::memory::Memory;
use sc_pattern::settings::{Settings, init_logging};
use sc_pattern::store::GraphStore;
use sc_pattern::types::ElementType;

#[test]
fn defaults() {
    let settings = Settings::default();
    assert_eq!(settings.log_filter, "info");
    assert!(settings.keynodes.is_empty());
    assert_eq!(settings.max_search_rows, None);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let path = std::env::temp_dir().join("sc_pattern_no_such_settings.toml");
    let settings = Settings::load(path.to_str()).expect("settings");
    assert_eq!(settings.keynodes, Settings::default().keynodes);
}

#[test]
fn settings_file() {
    let path = std::env::temp_dir().join(format!("sc_pattern_settings_{}.toml", std::process::id()));
    fs::write(
        &path,
        "log_filter = \"sc_pattern=debug\"\nkeynodes = [\"concept_book\", \"nrel_author\"]\nmax_search_rows = 10\n",
    )
    .expect("write settings");
    let settings = Settings::load(path.to_str()).expect("settings");
    fs::remove_file(&path).expect("remove settings");

    assert_eq!(settings.log_filter, "sc_pattern=debug");
    assert_eq!(settings.keynodes, vec![String::from("concept_book"), String::from("nrel_author")]);
    assert_eq!(settings.max_search_rows, Some(10));

    let memory = Memory::with_settings(&settings).expect("memory");
    let session = memory.session();
    let book = session.find_by_system_identifier("concept_book").expect("find").expect("keynode");
    assert_eq!(session.element_type(book).expect("type"), ElementType::CONST_NODE);
    assert_eq!(session.element_counts().expect("counts").nodes, 2);
}

#[test]
fn invalid_keynodes_are_reported() {
    let settings = Settings { keynodes: vec![String::from("not valid")], ..Settings::default() };
    assert!(Memory::with_settings(&settings).is_err());
}

#[test]
fn logging_can_be_initialized_twice() {
    let settings = Settings::default();
    init_logging(&settings);
    init_logging(&settings);
}
