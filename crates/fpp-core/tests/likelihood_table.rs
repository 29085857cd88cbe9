use fpp_core::{odds_label, FppError, LikelihoodTable, ModelLikelihood, DEFAULT_FPPV};
use proptest::prelude::*;

fn row(short: &str, prior: f64, lhood: f64) -> ModelLikelihood {
    ModelLikelihood {
        short_name: short.to_string(),
        name: short.to_uppercase(),
        prior,
        lhood,
    }
}

fn sample_table() -> LikelihoodTable {
    LikelihoodTable::new(
        vec![
            row("eb", 0.1, 0.002),
            row("heb", 0.05, 0.004),
            row("beb", 0.01, 0.01),
            row("pl", 0.2, 0.5),
        ],
        0.5,
    )
    .expect("table")
}

#[test]
fn fpp_matches_weight_ratio() {
    let table = sample_table();
    let planet = 0.2 * 0.5;
    let fp = 0.1 * 0.002 + 0.05 * 0.004 + 0.01 * 0.01;
    let fpp = table.fpp(&[]).expect("fpp");
    assert!((fpp - (1.0 - planet / (planet + fp))).abs() < 1e-12);
}

#[test]
fn skipped_models_do_not_contribute() {
    let table = sample_table();
    let all = table.fpp(&[]).expect("fpp");
    let without_beb = table.fpp(&["beb"]).expect("fpp");
    assert!(without_beb < all);
}

#[test]
fn fpv_uses_pval_and_fp_specific() {
    let table = sample_table();
    let pval = table.pval(&[]).expect("pval");
    let planet = 0.2 * 0.5;
    let fp = 0.1 * 0.002 + 0.05 * 0.004 + 0.01 * 0.01;
    assert!((pval - planet / fp / 0.5).abs() < 1e-9);
    let fpv = table.fpv(DEFAULT_FPPV, &[]).expect("fpv");
    assert!((fpv - (1.0 - DEFAULT_FPPV) / (pval * DEFAULT_FPPV)).abs() < 1e-9);
}

#[test]
fn missing_planet_model_is_a_backend_error() {
    let table = LikelihoodTable::new(vec![row("eb", 0.1, 0.1)], 1.0).expect("table");
    match table.fpp(&[]) {
        Err(FppError::Backend(info)) => assert_eq!(info.code, "planet_model_missing"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn negative_likelihood_is_rejected() {
    let err = LikelihoodTable::new(vec![row("pl", 0.1, -1.0)], 1.0).unwrap_err();
    assert_eq!(err.info().code, "invalid_likelihood");
}

#[test]
fn odds_label_clamps_tiny_probabilities() {
    assert_eq!(odds_label(0.01), "1 in 100");
    assert_eq!(odds_label(1e-9), "< 1 in 1e6");
    assert_eq!(odds_label(0.0), "< 1 in 1e6");
}

#[test]
fn posterior_shares_sum_to_one() {
    let shares = sample_table().posterior_shares();
    let total: f64 = shares.iter().map(|(_, share)| share).sum();
    assert!((total - 1.0).abs() < 1e-12);
    assert_eq!(shares[3].0, "pl");
}

proptest! {
    #[test]
    fn fpp_is_a_probability(
        planet_prior in 1e-6f64..1.0,
        planet_lhood in 1e-6f64..1.0,
        fp in proptest::collection::vec((0.0f64..1.0, 0.0f64..1.0), 0..6),
    ) {
        let mut models = vec![row("pl", planet_prior, planet_lhood)];
        for (idx, (prior, lhood)) in fp.into_iter().enumerate() {
            models.push(row(&format!("fp{idx}"), prior, lhood));
        }
        let table = LikelihoodTable::new(models, 1.0).expect("table");
        let fpp = table.fpp(&[]).expect("fpp");
        prop_assert!((0.0..=1.0).contains(&fpp));
    }
}
