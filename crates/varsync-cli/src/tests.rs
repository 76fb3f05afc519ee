use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["varsync-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_full_sync_defaults() {
    let cli = Cli::try_parse_from(["varsync-cli", "sync"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            collection: None,
            force: false
        })
    ));
}

#[test]
fn parses_forced_collection_sync() {
    let cli = Cli::try_parse_from(["varsync-cli", "sync", "--collection", "4412", "--force"])
        .expect("expected valid cli args");
    match cli.command {
        Some(Commands::Sync { collection, force }) => {
            assert_eq!(collection.as_deref(), Some("4412"));
            assert!(force);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_stats_json_flag() {
    let cli = Cli::try_parse_from(["varsync-cli", "stats", "--json"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Stats { json: true })));
}

#[test]
fn list_defaults_to_first_page_of_twenty() {
    let cli = Cli::try_parse_from(["varsync-cli", "list"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::List {
            status: None,
            collection: None,
            search: None,
            page: 1,
            page_size: 20
        })
    ));
}

#[test]
fn parses_list_filters() {
    let cli = Cli::try_parse_from([
        "varsync-cli",
        "list",
        "--status",
        "error",
        "--search",
        "linen",
        "--page",
        "3",
        "--page-size",
        "50",
    ])
    .expect("expected valid cli args");
    match cli.command {
        Some(Commands::List {
            status,
            search,
            page,
            page_size,
            ..
        }) => {
            assert_eq!(status.as_deref(), Some("error"));
            assert_eq!(search.as_deref(), Some("linen"));
            assert_eq!(page, 3);
            assert_eq!(page_size, 50);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn list_rejects_non_numeric_page() {
    assert!(Cli::try_parse_from(["varsync-cli", "list", "--page", "two"]).is_err());
}

#[test]
fn parses_resolve_selections_in_order() {
    let cli = Cli::try_parse_from([
        "varsync-cli",
        "resolve",
        "8123",
        "--select",
        "Color=Blue",
        "--select",
        "Size = M",
    ])
    .expect("expected valid cli args");
    match cli.command {
        Some(Commands::Resolve {
            product,
            selections,
            file,
        }) => {
            assert_eq!(product, "8123");
            assert_eq!(
                selections,
                vec![
                    ("Color".to_owned(), "Blue".to_owned()),
                    ("Size".to_owned(), "M".to_owned()),
                ]
            );
            assert!(file.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn resolve_rejects_selection_without_equals() {
    assert!(Cli::try_parse_from(["varsync-cli", "resolve", "8123", "--select", "Blue"]).is_err());
}

#[test]
fn parses_options_with_file() {
    let cli = Cli::try_parse_from(["varsync-cli", "options", "8123", "--file", "variants.json"])
        .expect("expected valid cli args");
    match cli.command {
        Some(Commands::Options { product, file }) => {
            assert_eq!(product, "8123");
            assert_eq!(file, Some(PathBuf::from("variants.json")));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_unit_commands() {
    for (arg, expected) in [
        ("collections", "Collections"),
        ("process", "Process"),
        ("migrate", "Migrate"),
    ] {
        let cli = Cli::try_parse_from(["varsync-cli", arg]).expect("expected valid cli args");
        let name = match cli.command {
            Some(Commands::Collections) => "Collections",
            Some(Commands::Process) => "Process",
            Some(Commands::Migrate) => "Migrate",
            other => panic!("unexpected command: {other:?}"),
        };
        assert_eq!(name, expected);
    }
}

#[test]
fn selection_value_may_contain_equals() {
    assert_eq!(
        parse_selection("Note=a=b"),
        Ok(("Note".to_owned(), "a=b".to_owned()))
    );
}

#[test]
fn selection_requires_a_name() {
    assert!(parse_selection("=Blue").is_err());
}
