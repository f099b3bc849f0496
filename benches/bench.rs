// Criterion benchmarks for memmer

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memmer::core::{assemble_monthly_fee_assets, compute_total_fee, PaymentInitiation, CreditorInfo};
use memmer::models::{
    Amount, ClubSnapshot, Gender, Member, Participation, Relation, TrainingSession,
    BASIC_FEE_ADULTS_KEY, BASIC_FEE_YOUTHS_KEY,
};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn create_member(id: i64) -> Member {
    Member {
        id,
        first_name: format!("First{}", id),
        last_name: format!("Last{}", id / 3),
        gender: if id % 2 == 0 { Gender::Female } else { Gender::Male },
        // Mix of youths and adults
        birthday: date(1970 + (id % 50) as i32, 1 + (id % 12) as u32, 1 + (id % 28) as u32),
        entry_date: date(2015, 1, 1),
        exit_date: None,
        street: "Hauptstrasse".to_string(),
        street_number: id.to_string(),
        postal_code: "75365".to_string(),
        city: "Calw".to_string(),
        phone_number: None,
        email_address: None,
        iban: "DE89370400440532013000".to_string(),
        bic: "COBADEFFXXX".to_string(),
        account_owner: format!("Owner {}", id),
        sepa_mandate_date: Some(date(2015, 1, 1)),
    }
}

/// Club with `size` members, five sessions and families of three
fn create_club(size: i64) -> ClubSnapshot {
    let mut snapshot = ClubSnapshot::new()
        .with_fixed_cost(BASIC_FEE_ADULTS_KEY, Amount::from_cents(500))
        .with_fixed_cost(BASIC_FEE_YOUTHS_KEY, Amount::from_cents(400));

    for session_id in 0..5 {
        snapshot.add_session(TrainingSession {
            id: session_id,
            name: format!("Session {}", session_id),
            membership_fee: Amount::from_cents(500 + session_id * 250),
        });
    }

    for id in 0..size {
        snapshot.add_member(create_member(id));

        for session_id in [id % 5, (id + 2) % 5] {
            snapshot.add_participation(Participation {
                member_id: id,
                session_id,
                since: date(2015, 1, 1),
                until: None,
            });
        }

        // Members with the same `id / 3` form a family
        let head = id - id % 3;
        if head != id {
            snapshot.add_relation(Relation::normalized(head, id));
        }
    }

    snapshot
}

fn bench_total_fee(c: &mut Criterion) {
    let snapshot = create_club(300);
    let target = date(2024, 3, 1);

    c.bench_function("compute_total_fee", |b| {
        b.iter(|| compute_total_fee(black_box(&snapshot), black_box(151), black_box(target)))
    });
}

fn bench_monthly_assets(c: &mut Criterion) {
    let target = date(2024, 3, 1);
    let mut group = c.benchmark_group("monthly_assets");

    for size in [50, 200, 1000].iter() {
        let snapshot = create_club(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                assemble_monthly_fee_assets(
                    black_box(&snapshot),
                    black_box(target),
                    "FEE-{mem_id}",
                    "Mitgliedsbeitrag",
                )
            })
        });
    }

    group.finish();
}

fn bench_render_tally(c: &mut Criterion) {
    let snapshot = create_club(1000);
    let target = date(2024, 3, 1);
    let assets = assemble_monthly_fee_assets(&snapshot, target, "FEE-{mem_id}", "Beitrag")
        .unwrap()
        .assets;
    let creditor = CreditorInfo {
        name: "Turnverein Calw".to_string(),
        iban: "DE02120300000000202051".to_string(),
        bic: "BYLADEM1001".to_string(),
        identification: "DE98ZZZ09999999999".to_string(),
    };

    c.bench_function("render_tally_1000", |b| {
        b.iter(|| {
            PaymentInitiation::new(
                "Memmer-bench",
                chrono::Utc::now(),
                target,
                creditor.clone(),
                black_box(&assets),
            )
            .map(|message| message.render())
        })
    });
}

criterion_group!(benches, bench_total_fee, bench_monthly_assets, bench_render_tally);
criterion_main!(benches);
