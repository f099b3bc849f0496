// Unit tests for memmer

use chrono::{Duration, NaiveDate};
use memmer::config::{ConfigKey, Settings};
use memmer::core::{
    collect_contacts, contacts::normalize_phone_number, format_contacts, member_counts,
    member_history, nominal_year_diff, outdated_cutoffs, relations, sepa::sanitize,
    session_roster, ContactFilter, ContactFormat, InvoiceLine, RelationGraph,
};
use memmer::models::{
    Amount, ClubSnapshot, Gender, Member, Participation, Relation, Tally, TrainingSession,
};
use memmer::services::patch_imports;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn create_test_member(id: i64, first_name: &str, last_name: &str, entry: NaiveDate) -> Member {
    Member {
        id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        gender: Gender::Diverse,
        birthday: date(2000, 6, 15),
        entry_date: entry,
        exit_date: None,
        street: "Hauptstrasse".to_string(),
        street_number: "1".to_string(),
        postal_code: "75365".to_string(),
        city: "Calw".to_string(),
        phone_number: None,
        email_address: None,
        iban: "DE89370400440532013000".to_string(),
        bic: "COBADEFFXXX".to_string(),
        account_owner: String::new(),
        sepa_mandate_date: None,
    }
}

#[test]
fn test_nominal_year_diff() {
    assert_eq!(nominal_year_diff(date(2000, 6, 15), date(2018, 6, 14)), 17);
    assert_eq!(nominal_year_diff(date(2000, 6, 15), date(2018, 6, 15)), 18);
    assert_eq!(nominal_year_diff(date(2018, 6, 15), date(2000, 6, 15)), -18);
}

#[test]
fn test_amount_parsing_and_rounding() {
    assert_eq!("12".parse::<Amount>().unwrap(), Amount::from_cents(1200));
    assert_eq!("12.3".parse::<Amount>().unwrap(), Amount::from_cents(1230));
    assert_eq!("-1.50".parse::<Amount>().unwrap().to_string(), "-1.50");
    assert!("1.234".parse::<Amount>().is_err());

    // 0.05 * 3/4 = 0.0375 -> 0.04
    assert_eq!(Amount::from_cents(5).scale(3, 4), Amount::from_cents(4));
    assert_eq!(Amount::from_cents(-5).scale(3, 4), Amount::from_cents(-4));
}

#[test]
fn test_invoice_line_gross() {
    let line = InvoiceLine {
        last_name: "Smoldriski".to_string(),
        first_name: "Sally".to_string(),
        description: "Trikot".to_string(),
        price: Amount::from_cents(2000),
        tax_rate: 1900,
    };
    assert_eq!(line.gross(), Amount::from_cents(2380));
}

#[test]
fn test_relation_transitivity() {
    let mut stored = vec![Relation::normalized(1, 2)];
    relations::make_relation(&mut stored, 3, 4);
    let added = relations::make_relation(&mut stored, 2, 3);

    // Joining two families of two members each needs four new pairs
    assert_eq!(added.len(), 4);

    let graph = RelationGraph::new(&stored);
    assert_eq!(graph.relatives(1), vec![2, 3, 4]);
    assert!(graph.are_related(1, 4));

    assert!(relations::drop_relation(&mut stored, 1, 4));
    assert!(!RelationGraph::new(&stored).are_related(1, 4));
    assert!(RelationGraph::new(&stored).are_related(1, 3));
}

#[test]
fn test_relating_relatives_again_is_a_no_op() {
    let mut stored = Vec::new();
    relations::make_relation(&mut stored, 5, 6);
    assert!(relations::make_relation(&mut stored, 6, 5).is_empty());
    assert!(relations::make_relation(&mut stored, 5, 5).is_empty());
}

#[test]
fn test_sanitize() {
    assert_eq!(sanitize("Jürgen Weiß"), "Juergen Weiss");
    assert_eq!(sanitize("René Ñandú"), "Rene Nandu");
    assert_eq!(sanitize("Beitrag 03/2024 & mehr!"), "Beitrag 03/2024  mehr");
}

#[test]
fn test_patch_imports_only_touches_plain_top_level_imports() {
    let source = "from PySide6.QtWidgets import QWidget\nfrom resources_rc import *\n";
    assert_eq!(
        patch_imports(source),
        "from PySide6.QtWidgets import QWidget\nfrom ..resources_rc import *\n"
    );
}

#[test]
fn test_session_roster_sorted_and_filtered() {
    let start = date(2023, 1, 1);
    let today = date(2024, 6, 15);

    let mut snapshot = ClubSnapshot::new()
        .with_member(create_test_member(1, "Zoe", "Adler", start))
        .with_member(create_test_member(2, "Anna", "Adler", start))
        .with_member(create_test_member(3, "Bert", "Berg", start))
        .with_session(TrainingSession {
            id: 10,
            name: "Kids".to_string(),
            membership_fee: Amount::from_cents(1200),
        });

    for member_id in [1, 2, 3] {
        snapshot.add_participation(Participation {
            member_id,
            session_id: 10,
            since: start,
            until: if member_id == 3 { Some(date(2024, 1, 1)) } else { None },
        });
    }

    let roster = session_roster(&snapshot, 10, today).unwrap();
    let names: Vec<_> = roster
        .members
        .iter()
        .map(|m| format!("{}, {}", m.last_name, m.first_name))
        .collect();

    assert_eq!(names, vec!["Adler, Anna", "Adler, Zoe"]);
    assert_eq!(roster.members[0].age, 24);
    assert!(session_roster(&snapshot, 99, today).is_none());
}

#[test]
fn test_member_counts_window() {
    let today = date(2024, 6, 30);

    let mut leaver = create_test_member(3, "Carl", "Cox", date(2020, 1, 1));
    leaver.exit_date = Some(date(2024, 6, 20));

    let snapshot = ClubSnapshot::new()
        .with_member(create_test_member(1, "Anna", "Adler", date(2020, 1, 1)))
        .with_member(create_test_member(2, "Bert", "Berg", date(2024, 6, 10)))
        .with_member(leaver)
        .with_member(create_test_member(4, "Dora", "Dahl", date(2024, 7, 1)));

    let counts = member_counts(&snapshot, today, Duration::days(30));
    assert_eq!(counts.active, 2);
    assert_eq!(counts.joins, 1);
    assert_eq!(counts.leaves, 1);
}

#[test]
fn test_member_counts_huge_window_counts_all_joins() {
    let snapshot = ClubSnapshot::new()
        .with_member(create_test_member(1, "Anna", "Adler", date(1990, 1, 1)))
        .with_member(create_test_member(2, "Bert", "Berg", date(2024, 6, 10)));

    let counts = member_counts(&snapshot, date(2024, 6, 1), Duration::days(100_000_000));
    assert_eq!(counts.active, 1);
    assert_eq!(counts.joins, 1);
    assert_eq!(counts.leaves, 0);
}

#[test]
fn test_member_history_stops_at_latest_date() {
    let snapshot = ClubSnapshot::new()
        .with_member(create_test_member(1, "Anna", "Adler", date(1990, 1, 1)));

    let since = NaiveDate::MAX - Duration::days(3);
    let history = member_history(&snapshot, since, NaiveDate::MAX, Duration::weeks(1));

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].date, since);
    assert_eq!(history[0].active, 1);
}

#[test]
fn test_normalize_phone_number() {
    assert_eq!(normalize_phone_number("+49 7051 12345"), "0049705112345");
    assert_eq!(normalize_phone_number("07051 12345"), "0705112345");
}

#[test]
fn test_contacts_grouped_by_channel() {
    let start = date(2020, 1, 1);

    let mut anna = create_test_member(1, "Anna", "Adler", start);
    anna.email_address = Some("adler@example.org".to_string());
    anna.phone_number = Some("+49 7051 12345".to_string());

    let mut bert = create_test_member(2, "Bert", "Adler", start);
    bert.email_address = Some("adler@example.org".to_string());

    let mut carl = create_test_member(3, "Carl", "Cox", start);
    carl.street = "Lederstrasse".to_string();
    carl.phone_number = Some("0049705112345".to_string());

    let mut dora = create_test_member(4, "Dora", "Dahl", start);
    dora.email_address = Some("dora@example.org".to_string());
    dora.exit_date = Some(date(2024, 1, 1));

    let snapshot = ClubSnapshot::new()
        .with_member(anna)
        .with_member(bert)
        .with_member(carl)
        .with_member(dora);
    let filter = ContactFilter {
        target_date: date(2024, 6, 1),
        min_age: None,
        max_age: None,
    };

    let info = collect_contacts(&snapshot, &filter);
    assert_eq!(info.email.len(), 1);
    assert_eq!(info.phone.len(), 1);
    assert_eq!(info.mail.len(), 2);

    let text = format_contacts(
        &info,
        ContactFormat {
            include_phone: true,
            ..ContactFormat::default()
        },
    );
    assert_eq!(
        text,
        "Email\n\
         - adler@example.org -> Anna Adler, Bert Adler\n\
         \n\
         Addresses\n\
         - Lederstrasse 1, 75365 Calw -> Carl Cox\n\
         \n\
         Phone numbers\n\
         - 0049705112345 -> Anna Adler, Carl Cox\n\
         \n"
    );

    let all = format_contacts(
        &info,
        ContactFormat {
            all_addresses: true,
            ..ContactFormat::default()
        },
    );
    assert!(all.contains("- Hauptstrasse 1, 75365 Calw -> Anna Adler, Bert Adler\n"));
    assert!(!all.contains("Phone numbers"));
}

#[test]
fn test_contacts_age_filter() {
    let mut youth = create_test_member(1, "Ida", "Imm", date(2020, 1, 1));
    youth.birthday = date(2012, 1, 1);
    let snapshot = ClubSnapshot::new()
        .with_member(youth)
        .with_member(create_test_member(2, "Jan", "Jung", date(2020, 1, 1)));

    let filter = ContactFilter {
        target_date: date(2024, 6, 1),
        min_age: Some(18),
        max_age: None,
    };
    let info = collect_contacts(&snapshot, &filter);

    assert_eq!(info.mail.len(), 1);
    assert_eq!(info.mail[0].1[0].first_name, "Jan");
}

#[test]
fn test_outdated_cutoffs_keep_ninety_days_of_archive() {
    let cutoffs = outdated_cutoffs(date(2024, 4, 1));
    assert_eq!(cutoffs.archived_billed.date_naive(), date(2024, 1, 2));
}

#[test]
fn test_tally_contents_round_trip() {
    let contents = "<Document>Grüße</Document>";
    let tally = Tally {
        id: 1,
        creation_time: chrono::Utc::now(),
        collection_date: date(2024, 1, 1),
        total_amount: Amount::ZERO,
        compressed_contents: Tally::compress(contents).unwrap(),
    };
    assert_eq!(tally.contents().unwrap(), contents);
}

#[test]
fn test_config_keys() {
    let mut settings = Settings::default();
    settings.set(ConfigKey::TallyDir, "/srv/tallies").unwrap();
    assert_eq!(settings.get(ConfigKey::TallyDir).as_deref(), Some("/srv/tallies"));
    assert!("tally.unknown".parse::<ConfigKey>().is_err());
}
