//! Property-based tests for document validation and transaction id handling.

use pix_checkout::{
    identity::{self, DocumentKind},
    services::orders::{reais_to_cents, sanitize_transaction_id, MAX_TRANSACTION_ID_LEN},
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn digit_string(len: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(0u8..10, len)
        .prop_map(|digits| digits.into_iter().map(|d| char::from(b'0' + d)).collect())
}

/// Formats an 11-digit CPF as `ddd.ddd.ddd-dd`.
fn format_cpf(digits: &str) -> String {
    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}

fn flip_last_digit(digits: &str) -> String {
    let mut bytes = digits.as_bytes().to_vec();
    let last = bytes.len() - 1;
    bytes[last] = b'0' + (bytes[last] - b'0' + 1) % 10;
    String::from_utf8(bytes).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn normalize_keeps_only_digits_and_is_idempotent(raw in ".{0,40}") {
        let once = identity::normalize(&raw);
        prop_assert!(once.bytes().all(|b| b.is_ascii_digit()));
        prop_assert_eq!(identity::normalize(&once), once.clone());
        prop_assert_eq!(once.len(), raw.chars().filter(|c| c.is_ascii_digit()).count());
    }

    #[test]
    fn formatting_does_not_change_validity(digits in digit_string(11)) {
        prop_assert_eq!(
            identity::is_valid_document(&format_cpf(&digits)),
            identity::is_valid_cpf(&digits)
        );
    }

    #[test]
    fn wrong_lengths_are_never_valid(digits in "[0-9]{0,20}") {
        prop_assume!(DocumentKind::of(&digits).is_none());
        prop_assert!(!identity::is_valid_document(&digits));
        prop_assert!(!identity::is_valid_cpf(&digits));
        prop_assert!(!identity::is_valid_cnpj(&digits));
    }

    #[test]
    fn repeated_digits_are_never_valid(d in 0u8..10) {
        let c = char::from(b'0' + d);
        let cpf: String = std::iter::repeat(c).take(11).collect();
        let cnpj: String = std::iter::repeat(c).take(14).collect();
        prop_assert!(!identity::is_valid_cpf(&cpf));
        prop_assert!(!identity::is_valid_cnpj(&cnpj));
    }

    #[test]
    fn corrupting_a_check_digit_invalidates(_seed in any::<u8>()) {
        let cpf = identity::generate_valid_cpf();
        prop_assert!(identity::is_valid_cpf(&cpf));
        prop_assert!(!identity::is_valid_cpf(&flip_last_digit(&cpf)));
    }

    #[test]
    fn sanitized_ids_are_safe(raw in ".{0,200}") {
        if let Some(id) = sanitize_transaction_id(&raw) {
            prop_assert!(!id.is_empty());
            prop_assert!(id.len() <= MAX_TRANSACTION_ID_LEN);
            prop_assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')));
            prop_assert_eq!(sanitize_transaction_id(&id), Some(id.clone()));
        }
    }

    #[test]
    fn whole_centavo_amounts_convert_exactly(cents in 0i64..100_000_000) {
        prop_assert_eq!(reais_to_cents(Decimal::new(cents, 2)), cents);
    }
}

#[test]
fn generator_output_is_always_a_valid_unformatted_cpf() {
    for _ in 0..10_000 {
        let cpf = identity::generate_valid_cpf();
        assert_eq!(cpf.len(), 11);
        assert!(cpf.bytes().all(|b| b.is_ascii_digit()), "{cpf}");
        assert!(identity::is_valid_cpf(&cpf), "{cpf}");
        assert!(identity::is_valid_document(&cpf), "{cpf}");
    }
}

#[test]
fn known_documents() {
    assert!(identity::is_valid_cpf("11144477735"));
    assert!(!identity::is_valid_cpf("11144477736"));
    assert!(identity::is_valid_cnpj("11222333000181"));
    assert!(!identity::is_valid_cnpj("11222333000180"));
    assert!(identity::is_valid_document("11.222.333/0001-81"));
    assert_eq!(identity::normalize("123.456.789-09"), "12345678909");
    assert!(!identity::is_valid_document("000.000.000-00"));
}
