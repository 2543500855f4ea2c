//! Edge case tests for LER computation
//! Empty inputs, absent descriptors, malformed vectors and degenerate parameters

use ler::prelude::*;
use ler::{
    build_artifact, ClusterBuilder, EnvironmentId, ErrorCode, ForestIndex, Recoverable,
};
use std::sync::Arc;

fn context(vectors: PrecomputedVectors, seeds: StaticSeeds) -> (DescriptorContext, Arc<InMemoryArtifactCache>) {
    let cache = Arc::new(InMemoryArtifactCache::new());
    let ctx = DescriptorContext::new(Arc::new(vectors), Arc::new(seeds), cache.clone());
    (ctx, cache)
}

// ============================================================================
// Empty Inputs
// ============================================================================

#[test]
fn test_empty_collection_with_explicit_seed() {
    let collection = Collection::new("empty");
    let params = LerParams::new(1.0).with_seed_vector(vec![1.0, 2.0]);
    let (ctx, _) = context(PrecomputedVectors::new(), StaticSeeds::new());

    let artifact = ctx.artifact(&collection, &params).unwrap();
    assert_eq!(artifact.center_count(), 1);
    assert_eq!(artifact.vector_count(), 0);
    assert_eq!(artifact.bucket_sizes(), vec![0]);
}

#[test]
fn test_empty_collection_without_seed_source() {
    let collection = Collection::new("empty");
    let (ctx, _) = context(PrecomputedVectors::new(), StaticSeeds::new().with_seed("Ni", vec![0.0]));

    let err = ctx.artifact(&collection, &LerParams::new(1.0)).unwrap_err();
    assert!(matches!(err, LerError::SeedUnavailable(_)));
    assert_eq!(err.error_code(), ErrorCode::SeedUnavailable);
}

#[test]
fn test_configuration_without_atoms_has_no_histogram() {
    let vectors = PrecomputedVectors::new();
    vectors.insert("full", vec![vec![0.0], vec![2.0]]);
    let collection = Collection::from_configurations(
        "mixed",
        vec![
            Configuration::homogeneous("full", "Ni", 2),
            Configuration::new("vacuum", vec![]),
        ],
    )
    .unwrap();
    let (ctx, _) = context(vectors, StaticSeeds::new().with_seed("Ni", vec![0.0]));

    let params = LerParams::new(1.0);
    assert!(compute_ler(&"vacuum".into(), &collection, &params, &ctx).unwrap().is_none());
    assert!(compute_ler(&"full".into(), &collection, &params, &ctx).unwrap().is_some());
}

#[test]
fn test_unknown_configuration_is_not_found() {
    let collection =
        Collection::from_configurations("c", vec![Configuration::homogeneous("a", "Ni", 1)]).unwrap();
    let (ctx, cache) = context(PrecomputedVectors::new(), StaticSeeds::new());

    let err = compute_ler(&"nope".into(), &collection, &LerParams::new(1.0), &ctx).unwrap_err();
    assert!(matches!(err, LerError::ConfigurationNotFound(_)));
    assert_eq!(cache.stats().size, 0);
}

// ============================================================================
// Malformed Vectors
// ============================================================================

#[test]
fn test_never_computed_configuration_is_missing_descriptor() {
    let collection =
        Collection::from_configurations("c", vec![Configuration::homogeneous("a", "Ni", 2)]).unwrap();
    let (ctx, cache) = context(PrecomputedVectors::new(), StaticSeeds::new().with_seed("Ni", vec![0.0]));

    let err = compute_ler(&"a".into(), &collection, &LerParams::new(1.0), &ctx).unwrap_err();
    assert!(matches!(err, LerError::MissingDescriptor { atom: 0, .. }));
    assert!(err.format_with_hints().contains("Recovery suggestions"));
    assert_eq!(cache.stats().size, 0);
}

#[test]
fn test_short_rows_are_missing_descriptors() {
    let vectors = PrecomputedVectors::new();
    vectors.insert("a", vec![vec![0.0]]);
    let collection =
        Collection::from_configurations("c", vec![Configuration::homogeneous("a", "Ni", 3)]).unwrap();

    let err = build_artifact(&collection, &LerParams::new(1.0), vec![0.0], &vectors).unwrap_err();
    assert!(matches!(err, LerError::MissingDescriptor { atom: 1, .. }));
}

#[test]
fn test_non_finite_component_is_invalid_vector() {
    let vectors = PrecomputedVectors::new();
    vectors.insert("a", vec![vec![0.0, f32::NAN]]);
    let collection =
        Collection::from_configurations("c", vec![Configuration::homogeneous("a", "Ni", 1)]).unwrap();

    let err = build_artifact(&collection, &LerParams::new(1.0), vec![0.0, 0.0], &vectors).unwrap_err();
    assert!(matches!(err, LerError::InvalidVector(_)));
    assert!(err.is_input_error());
}

#[test]
fn test_mixed_dimensions_are_rejected() {
    let vectors = PrecomputedVectors::new();
    vectors.insert("a", vec![vec![0.0, 0.0], vec![1.0]]);
    let collection =
        Collection::from_configurations("c", vec![Configuration::homogeneous("a", "Ni", 2)]).unwrap();

    let err = build_artifact(&collection, &LerParams::new(1.0), vec![0.0, 0.0], &vectors).unwrap_err();
    assert!(matches!(err, LerError::DimensionMismatch { expected: 2, got: 1 }));
}

#[test]
fn test_forest_query_with_wrong_dimension() {
    let index = ForestIndex::build(
        vec![vec![0.0, 0.0], vec![1.0, 1.0]],
        DistanceFunction::Euclidean,
        ForestConfig::default(),
    )
    .unwrap();
    assert!(matches!(
        index.nearest(&[0.0]),
        Err(LerError::DimensionMismatch { expected: 2, got: 1 })
    ));
}

// ============================================================================
// Degenerate Parameters
// ============================================================================

#[test]
fn test_zero_eps_makes_every_vector_a_center() {
    let stream: Vec<(EnvironmentId, Vec<f32>)> =
        (0..5).map(|i| (EnvironmentId::new("a", i), vec![0.0])).collect();
    let centers = ClusterBuilder::build(
        vec![0.0],
        stream.iter().map(|(id, v)| (id.clone(), Some(v.as_slice()))),
        0.0,
        DistanceFunction::Euclidean,
    )
    .unwrap();
    assert_eq!(centers.len(), 6);
}

#[test]
fn test_invalid_params_rejected_before_any_work() {
    let vectors = PrecomputedVectors::new();
    vectors.insert("a", vec![vec![0.0]]);
    let collection =
        Collection::from_configurations("c", vec![Configuration::homogeneous("a", "Ni", 1)]).unwrap();
    let (ctx, cache) = context(vectors, StaticSeeds::new().with_seed("Ni", vec![0.0]));

    for params in [
        LerParams::new(-1.0),
        LerParams::new(1.0).with_forest(ForestConfig::new(0)),
        LerParams::new(1.0).with_seed_vector(vec![]),
    ] {
        let err = compute_ler(&"a".into(), &collection, &params, &ctx).unwrap_err();
        assert!(matches!(err, LerError::InvalidConfig(_)));
    }
    assert_eq!(cache.stats().misses, 0);
}

#[test]
fn test_dot_product_metric_is_rejected() {
    let vectors = PrecomputedVectors::new();
    vectors.insert("a", vec![vec![1.0, 1.0], vec![5.0, 5.0]]);
    let collection =
        Collection::from_configurations("c", vec![Configuration::homogeneous("a", "Ni", 2)]).unwrap();
    let params = LerParams::new(1.0).with_metric(DistanceFunction::DotProduct);
    let (ctx, cache) = context(vectors, StaticSeeds::new().with_seed("Ni", vec![1.0, 1.0]));

    // -dot([1,1], [5,5]) is negative, so every vector would count as covered.
    let err = compute_ler(&"a".into(), &collection, &params, &ctx).unwrap_err();
    assert!(matches!(err, LerError::InvalidConfig(_)));
    assert_eq!(cache.stats().misses, 0);

    let stream = [(EnvironmentId::new("a", 1), vec![5.0, 5.0])];
    assert!(ClusterBuilder::build(
        vec![1.0, 1.0],
        stream.iter().map(|(id, v)| (id.clone(), Some(v.as_slice()))),
        1.0,
        DistanceFunction::DotProduct,
    )
    .is_err());
}

#[test]
fn test_negative_search_k_means_default() {
    let config = ForestConfig::new(4).with_search_k_raw(-1);
    assert_eq!(config.search_k, None);
    assert_eq!(config.effective_search_k(1), 4 * 16);
    assert!(config.validate().is_ok());
}

#[test]
fn test_single_tree_tiny_leaves_still_partition() {
    let vectors = PrecomputedVectors::new();
    let rows: Vec<Vec<f32>> = (0..40).map(|i| vec![(i % 7) as f32, (i / 7) as f32]).collect();
    vectors.insert("grid", rows);
    let collection =
        Collection::from_configurations("c", vec![Configuration::homogeneous("grid", "Al", 40)]).unwrap();
    let params = LerParams::new(1.5).with_forest(
        ForestConfig::new(1).with_leaf_size(1).with_search_k(1).with_seed(5),
    );

    let artifact = build_artifact(&collection, &params, vec![0.0, 0.0], &vectors).unwrap();
    assert_eq!(artifact.vector_count(), 40);
    let hist = artifact.histogram(&"grid".into()).unwrap();
    assert!((hist.sum() - 1.0).abs() < 1e-9);
}
