use approx::assert_relative_eq;
use iga_core::{TokenReader, Validate};
use iga_nurbs::{KnotVector, NurbsPatch, RemovalOutcome, Span};

fn open_knots(order: usize, interior: &[f64]) -> KnotVector {
    let mut knots = vec![0.0; order + 1];
    knots.extend_from_slice(interior);
    knots.extend(vec![1.0; order + 1]);
    KnotVector::new(order, knots).unwrap()
}

/// A curved, non-uniformly weighted sheet over the given knot vectors.
fn sheet(k0: KnotVector, k1: KnotVector) -> NurbsPatch {
    let mut patch = NurbsPatch::new(vec![k0, k1], 3).unwrap();
    let (n0, n1) = (patch.ncp(0).unwrap(), patch.ncp(1).unwrap());
    for j in 0..n1 {
        for i in 0..n0 {
            let w = 1.0 + 0.2 * ((3 * i + j) % 4) as f64;
            let x = i as f64 + 0.3 * (j as f64).sin();
            let y = j as f64 + 0.1 * (i * i) as f64;
            patch.set(&[i, j], 0, w * x).unwrap();
            patch.set(&[i, j], 1, w * y).unwrap();
            patch.set_weight(&[i, j], w).unwrap();
        }
    }
    patch
}

fn grid() -> Vec<[f64; 2]> {
    let mut pts = Vec::new();
    for i in 0..=8 {
        for j in 0..=8 {
            pts.push([i as f64 / 8.0, j as f64 / 8.0]);
        }
    }
    pts
}

fn assert_same_geometry(a: &NurbsPatch, b: &NurbsPatch, eps: f64) {
    for uv in grid() {
        let pa = a.evaluate(&uv).unwrap();
        let pb = b.evaluate(&uv).unwrap();
        assert_relative_eq!(pa[0], pb[0], epsilon = eps);
        assert_relative_eq!(pa[1], pb[1], epsilon = eps);
    }
}

#[test]
fn test_uniform_refinement_of_single_patch() {
    let kv = KnotVector::new(2, vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]).unwrap();
    let original = sheet(kv.clone(), kv);
    let mut patch = original.clone();
    let before: usize = patch
        .knot_vectors()
        .iter()
        .map(KnotVector::element_count)
        .product();

    patch.uniform_refinement_all(2).unwrap();
    let after: usize = patch
        .knot_vectors()
        .iter()
        .map(KnotVector::element_count)
        .product();
    assert_eq!(after, 4 * before);
    patch.validate().unwrap();

    for kv in patch.knot_vectors() {
        for span in 0..kv.knot_span_count() {
            if !kv.is_element(span) {
                continue;
            }
            for xi in [0.0, 0.25, 0.5, 0.99] {
                let sum: f64 = kv.calc_shape(Span::forward(span), xi).unwrap().iter().sum();
                assert_relative_eq!(sum, 1.0, epsilon = 1e-14);
            }
        }
    }
    assert_same_geometry(&original, &patch, 1e-12);
}

#[test]
fn test_insert_remove_round_trip_for_orders_one_to_five() {
    for order in 1..=5 {
        // Interior knot of multiplicity 2 to exercise repeated knots.
        let interior = [0.35, 0.35, 0.6];
        let k0 = open_knots(order, &interior[..order.min(3)]);
        let k1 = open_knots(1, &[]);
        let original = sheet(k0, k1);

        let mut patch = original.clone();
        patch.knot_insert(0, &[0.2, 0.6, 0.8]).unwrap();
        assert_same_geometry(&original, &patch, 1e-11);

        let outcome = patch.knot_remove_list(0, &[0.2, 0.6, 0.8], 1e-9).unwrap();
        assert!(outcome.is_complete(), "order {order}: {outcome:?}");
        assert_eq!(patch.knot_vector(0).unwrap(), original.knot_vector(0).unwrap());
        for (a, b) in patch.data().iter().zip(original.data()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_degree_elevation_keeps_geometry() {
    let k0 = open_knots(2, &[0.3, 0.3, 0.7]);
    let k1 = open_knots(3, &[0.5]);
    let original = sheet(k0, k1);
    for t in 0..=2 {
        let mut patch = original.clone();
        patch.degree_elevate_all(t).unwrap();
        assert_eq!(patch.knot_vector(0).unwrap().order(), 2 + t);
        assert_eq!(patch.knot_vector(1).unwrap().order(), 3 + t);
        assert_same_geometry(&original, &patch, 1e-10);
    }
}

#[test]
fn test_removing_twice_a_simple_knot_fails() {
    let kv = KnotVector::new(2, vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]).unwrap();
    let mut patch = sheet(kv.clone(), kv);
    let before = patch.clone();
    assert!(patch.knot_remove(0, 0.5, 2, 1e3).is_err());
    assert_eq!(patch, before);
}

#[test]
fn test_partial_removal_reports_count() {
    let kv = open_knots(2, &[0.5]);
    let mut patch = sheet(kv.clone(), kv);
    patch.knot_insert(0, &[0.5]).unwrap();
    // One copy came from insertion; the original one carries the shape.
    let outcome = patch.knot_remove(0, 0.5, 2, 1e-9).unwrap();
    assert_eq!(outcome, RemovalOutcome { requested: 2, removed: 1 });
    assert_eq!(patch.ncp(0).unwrap(), 4);
}

#[test]
fn test_difference_drives_insertion() {
    let small = open_knots(2, &[0.5]);
    let large = open_knots(2, &[0.25, 0.5, 0.5, 0.75]);
    let d1 = small.difference(&large).unwrap();
    let d2 = large.difference(&small).unwrap();
    assert_eq!(d1, vec![0.25, 0.5, 0.75]);
    assert_eq!(d1, d2);

    let mut patch = sheet(small, open_knots(1, &[]));
    patch.knot_insert(0, &d1).unwrap();
    assert_eq!(patch.knot_vector(0).unwrap().knots(), large.knots());
}

#[test]
fn test_text_and_serde_round_trips() {
    let patch = sheet(open_knots(2, &[0.4]), open_knots(1, &[0.5]));
    let mut buf = Vec::new();
    patch.print(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let again = NurbsPatch::read(&mut TokenReader::new(&text)).unwrap();
    assert_eq!(again, patch);

    let json = serde_json::to_string(&patch).unwrap();
    let back: NurbsPatch = serde_json::from_str(&json).unwrap();
    assert_eq!(back, patch);
    assert_eq!(
        back.knot_vector(0).unwrap().element_count(),
        patch.knot_vector(0).unwrap().element_count()
    );
}
