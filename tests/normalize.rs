// tests/normalize.rs
use auction_monitor::normalize::{format_amount, normalize_price};

#[test]
fn documented_examples() {
    assert_eq!(normalize_price("R$ 1.234,56"), 1234.56);
    assert_eq!(normalize_price("1,234.56"), 1234.56);
    assert_eq!(normalize_price(""), 0.0);
    assert_eq!(normalize_price("N/A"), 0.0);
    assert_eq!(normalize_price(None), 0.0);
}

#[test]
fn ambiguous_three_digit_group_reads_as_thousands() {
    assert_eq!(normalize_price("1.234"), 1234.0);
    assert_eq!(normalize_price("R$ 1.234"), 1234.0);
}

#[test]
fn total_and_deterministic_over_noisy_inputs() {
    let samples = [
        "R$ 1.234,56",
        "US$ 2,000",
        "€ 99,9",
        "1.2.3,4,5",
        ",,,",
        "...",
        "R$ -50,00",
        "1e309",
        "12abc34",
        "\u{a0}\u{a0}",
        "🎨 R$ 10",
        "99999999999999999999999999999999999999999999",
        "Lance inicial: R$ 3.500,00",
    ];
    for raw in samples {
        let a = normalize_price(raw);
        let b = normalize_price(raw);
        assert!(a.is_finite() && a >= 0.0, "{raw:?} -> {a}");
        assert_eq!(a.to_bits(), b.to_bits(), "{raw:?} not deterministic");
    }
    assert_eq!(normalize_price("Lance inicial: R$ 3.500,00"), 3500.0);
    assert_eq!(normalize_price("R$ -50,00"), 50.0);
}

#[test]
fn display_format_matches_dashboard() {
    assert_eq!(format_amount(normalize_price("1,234.56")), "R$ 1.234,56");
    assert_eq!(format_amount(12.5), "R$ 12,50");
}
