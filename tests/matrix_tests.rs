//! Matrix engine behavior over the in-memory store: cell regeneration,
//! point lookups and threshold classification.

mod common;

use common::{standard_levels, Harness};
use riskdesk_backend::error::ApiError;
use riskdesk_backend::models::*;
use riskdesk_backend::repositories::MatrixRepository;
use uuid::Uuid;

fn five_by_five() -> RiskMatrixCreate {
    RiskMatrixCreate {
        name: "Corporate 5x5".to_string(),
        size: 5,
        kind: MatrixKind::ImpactLikelihood,
        impact_levels: standard_levels(),
        likelihood_levels: standard_levels(),
        exposure_levels: vec![],
        thresholds: None,
        sla_hours: SlaHoursConfig {
            critical: 4,
            high: 24,
            medium: 168,
            low: 720,
        },
    }
}

#[tokio::test]
async fn generation_produces_the_exact_cross_product() {
    let h = Harness::new();

    let matrix = h.matrix_service.create_matrix(five_by_five()).await.unwrap();
    let count = h.matrix_service.generate_cells(&matrix.id).await.unwrap();
    assert_eq!(count, 25);
    assert_eq!(h.matrices.count_cells(&matrix.id).await.unwrap(), 25);

    // Regeneration replaces, never accumulates
    h.matrix_service.generate_cells(&matrix.id).await.unwrap();
    assert_eq!(h.matrices.count_cells(&matrix.id).await.unwrap(), 25);
}

#[tokio::test]
async fn three_d_generation_is_size_cubed() {
    let h = Harness::new();

    let mut request = five_by_five();
    request.name = "3-D".to_string();
    request.size = 3;
    request.kind = MatrixKind::ImpactLikelihoodExposure;
    request.impact_levels.truncate(3);
    request.likelihood_levels.truncate(3);
    request.exposure_levels = vec![
        ExposureBand {
            name: "Contained".to_string(),
            weight: 1.0,
            multiplier: 0.5,
        },
        ExposureBand {
            name: "Internal".to_string(),
            weight: 2.0,
            multiplier: 1.0,
        },
        ExposureBand {
            name: "Internet-facing".to_string(),
            weight: 3.0,
            multiplier: 1.5,
        },
    ];

    let matrix = h.matrix_service.create_matrix(request).await.unwrap();
    let count = h.matrix_service.generate_cells(&matrix.id).await.unwrap();
    assert_eq!(count, 27);
}

#[tokio::test]
async fn top_corner_of_a_five_by_five_is_critical() {
    let h = Harness::new();

    let matrix = h.matrix_service.create_matrix(five_by_five()).await.unwrap();
    h.matrix_service.generate_cells(&matrix.id).await.unwrap();

    // Highest impact and likelihood: score 25, normalized 1.0
    let level = h
        .matrix_service
        .calculate_risk_level(&matrix.id, 4, 4, None)
        .await
        .unwrap();
    assert_eq!(level, RiskLevel::Critical);

    let score = h
        .matrix_service
        .calculate_risk_score(&matrix.id, 4, 4, None)
        .await
        .unwrap();
    assert_eq!(score, 25.0);

    let level = h
        .matrix_service
        .calculate_risk_level(&matrix.id, 0, 0, None)
        .await
        .unwrap();
    assert_eq!(level, RiskLevel::Low);
}

#[tokio::test]
async fn missing_cells_fall_back_to_medium() {
    let h = Harness::new();

    let matrix = h.matrix_service.create_matrix(five_by_five()).await.unwrap();
    h.matrix_service.generate_cells(&matrix.id).await.unwrap();

    // Out-of-range coordinates have no cell
    let level = h
        .matrix_service
        .calculate_risk_level(&matrix.id, 9, 9, None)
        .await
        .unwrap();
    assert_eq!(level, RiskLevel::Medium);

    let score = h
        .matrix_service
        .calculate_risk_score(&matrix.id, 9, 9, None)
        .await
        .unwrap();
    assert_eq!(score, 0.0);

    // An unknown matrix stays a hard error
    let err = h
        .matrix_service
        .calculate_risk_level(&Uuid::new_v4(), 0, 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn activation_requires_valid_levels_and_generated_cells() {
    let h = Harness::new();

    // Wrong level count never activates
    let mut broken = five_by_five();
    broken.impact_levels.truncate(3);
    let matrix = h.matrix_service.create_matrix(broken).await.unwrap();
    let err = h.matrix_service.set_default(&matrix.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Configuration(_)));

    // Valid but ungenerated is rejected too
    let matrix = h.matrix_service.create_matrix(five_by_five()).await.unwrap();
    let err = h.matrix_service.set_default(&matrix.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Configuration(_)));

    h.matrix_service.generate_cells(&matrix.id).await.unwrap();
    let promoted = h.matrix_service.set_default(&matrix.id).await.unwrap();
    assert!(promoted.is_default && promoted.is_active);
}

#[tokio::test]
async fn promoting_a_new_default_demotes_the_previous_one() {
    let h = Harness::new();

    let first = h.matrix_service.create_matrix(five_by_five()).await.unwrap();
    h.matrix_service.generate_cells(&first.id).await.unwrap();
    h.matrix_service.set_default(&first.id).await.unwrap();

    let mut second_request = five_by_five();
    second_request.name = "Successor".to_string();
    let second = h.matrix_service.create_matrix(second_request).await.unwrap();
    h.matrix_service.generate_cells(&second.id).await.unwrap();
    h.matrix_service.set_default(&second.id).await.unwrap();

    let first = h.matrix_service.get_matrix(&first.id).await.unwrap();
    assert!(!first.is_default);

    let active = h.matrices.get_default_active().await.unwrap().unwrap();
    assert_eq!(active.id, second.id);
}

#[tokio::test]
async fn classification_needs_an_active_default_matrix() {
    let h = Harness::new();

    let err = h.matrix_service.classify_score(16.0).await.unwrap_err();
    assert!(matches!(err, ApiError::Configuration(_)));

    h.install_default_matrix().await;

    assert_eq!(
        h.matrix_service.classify_score(25.0).await.unwrap(),
        RiskLevel::Critical
    );
    assert_eq!(
        h.matrix_service.classify_score(16.0).await.unwrap(),
        RiskLevel::High
    );
    assert_eq!(
        h.matrix_service.classify_score(10.0).await.unwrap(),
        RiskLevel::Medium
    );
    assert_eq!(
        h.matrix_service.classify_score(4.0).await.unwrap(),
        RiskLevel::Low
    );
}

#[tokio::test]
async fn sla_hours_come_from_the_default_matrix_when_one_exists() {
    let h = Harness::new();

    // Settings fallback first
    assert_eq!(
        h.matrix_service
            .sla_hours_for_level(RiskLevel::Critical)
            .await
            .unwrap(),
        4
    );

    let mut request = five_by_five();
    request.sla_hours = SlaHoursConfig {
        critical: 2,
        high: 12,
        medium: 96,
        low: 480,
    };
    let matrix = h.matrix_service.create_matrix(request).await.unwrap();
    h.matrix_service.generate_cells(&matrix.id).await.unwrap();
    h.matrix_service.set_default(&matrix.id).await.unwrap();

    assert_eq!(
        h.matrix_service
            .sla_hours_for_level(RiskLevel::Critical)
            .await
            .unwrap(),
        2
    );
    assert_eq!(
        h.matrix_service
            .sla_hours_for_level(RiskLevel::Low)
            .await
            .unwrap(),
        480
    );
}
