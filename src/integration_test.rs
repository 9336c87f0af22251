#[cfg(test)]
mod integration_tests {
    use crate::distance::{EuclideanDistance, ManhattanDistance, SquaredEuclideanDistance};
    use crate::phtree::{KeyEuclidean, PhTree, PhTreeF};
    use crate::{EngineKind, ObjectId, RStarTree, SpatialError, TreeConfig, VectorRelation};

    /// Points 0, 1, 2, 3 and 10 on a line, ids in insertion order.
    fn line() -> RStarTree {
        let mut tree = RStarTree::new(1).unwrap();
        for (i, x) in [0.0, 1.0, 2.0, 3.0, 10.0].into_iter().enumerate() {
            tree.insert(ObjectId(i as u64), &[x]).unwrap();
        }
        tree
    }

    #[test]
    fn test_line_scenario_on_both_engines() {
        let tree = line();
        for (distance, kind) in [
            (&EuclideanDistance as &dyn crate::SpatialDistance, EngineKind::Euclidean),
            (&ManhattanDistance as &dyn crate::SpatialDistance, EngineKind::Generic),
        ] {
            let engine = tree.query(distance);
            assert_eq!(engine.kind(), kind);

            let nearest = engine.knn(&[2.5], 2).unwrap();
            assert_eq!(nearest.ids(), vec![ObjectId(2), ObjectId(3)], "tie at 0.5 breaks by id");
            assert!(nearest.iter().all(|n| n.distance == 0.5));

            let close = engine.range(&[2.5], 1.0).unwrap();
            assert_eq!(close.ids(), vec![ObjectId(2), ObjectId(3)]);

            let all = engine.knn(&[2.5], 10).unwrap();
            assert_eq!(all.ids(), vec![ObjectId(2), ObjectId(3), ObjectId(1), ObjectId(0), ObjectId(4)]);
            assert_eq!(all.max_distance(), Some(7.5));
        }

        // squared values are reported as squared
        let squared = tree.knn(&[2.5], 2, &SquaredEuclideanDistance).unwrap();
        assert!(squared.iter().all(|n| n.distance == 0.25));
    }

    #[test]
    fn test_line_scenario_with_cursor() {
        let tree = line();
        let mut cursor = tree.priority_search(&[2.5], &EuclideanDistance).unwrap();
        let mut best = f64::INFINITY;
        let mut seen = 0;
        while cursor.valid() {
            let distance = cursor.compute_exact_distance().unwrap();
            if distance < best {
                best = distance;
                cursor.decrease_cutoff(best).unwrap();
            }
            seen += 1;
            cursor.advance();
        }
        assert_eq!(best, 0.5);
        assert!(seen <= 5);

        let mut bounded = tree.priority_search(&[2.5], &EuclideanDistance).unwrap();
        bounded.decrease_cutoff(1.0).unwrap();
        assert!(matches!(bounded.decrease_cutoff(2.0), Err(SpatialError::CutoffIncreased { .. })));
    }

    #[test]
    fn test_empty_tree() {
        let tree = RStarTree::new(4).unwrap();
        let query = [0.0; 4];
        assert!(tree.knn(&query, 3, &EuclideanDistance).unwrap().is_empty());
        assert!(tree.range(&query, 100.0, &ManhattanDistance).unwrap().is_empty());
        assert!(!tree.priority_search(&query, &EuclideanDistance).unwrap().valid());
        assert_eq!(tree.bounds(), None);
    }

    #[test]
    fn test_build_then_query_by_id() {
        let relation =
            VectorRelation::from_vectors([[0.0, 0.0], [3.0, 4.0], [1.0, 1.0], [6.0, 8.0], [-1.0, 0.0]]).unwrap();
        let tree = RStarTree::from_relation(&relation, TreeConfig::default()).unwrap();
        let engine = tree.query(&EuclideanDistance);

        let nearest = engine.knn_by_id(&relation, ObjectId(0), 3).unwrap();
        assert_eq!(nearest.ids(), vec![ObjectId(0), ObjectId(4), ObjectId(2)], "query point finds itself first");

        let ring = engine.range_by_id(&relation, ObjectId(0), 5.0).unwrap();
        assert_eq!(ring.max_distance(), Some(5.0), "the 3-4-5 point is on the boundary");
        assert_eq!(ring.len(), 4);

        assert!(matches!(engine.knn_by_id(&relation, ObjectId(9), 1), Err(SpatialError::UnknownObject(_))));
    }

    #[test]
    fn test_insert_delete_query_cycle() {
        let mut tree = RStarTree::with_config(2, TreeConfig::default().with_capacity(4)).unwrap();
        for i in 0..200_u64 {
            tree.insert(ObjectId(i), &[(i % 20) as f64, (i / 20) as f64]).unwrap();
        }
        for i in (0..200_u64).filter(|i| i % 2 == 0) {
            assert!(tree.delete(ObjectId(i), &[(i % 20) as f64, (i / 20) as f64]).unwrap());
        }
        assert_eq!(tree.len(), 100);
        let nearest = tree.knn(&[0.0, 0.0], 1, &EuclideanDistance).unwrap();
        assert_eq!(nearest.ids(), vec![ObjectId(1)], "even ids are gone");
        let close = tree.range(&[10.0, 5.0], 1.0, &ManhattanDistance).unwrap();
        assert_eq!(close.ids(), vec![ObjectId(109), ObjectId(111)]);
    }

    #[test]
    fn test_phtree_line_scenario() {
        let mut tree = PhTreeF::new(1).unwrap();
        for (i, x) in [0.0, 1.0, 2.0, 3.0, 10.0].into_iter().enumerate() {
            let _ = tree.put(&[x], i).unwrap();
        }
        let nearest = tree.nearest_neighbor(2, &EuclideanDistance, None, &[2.5]).unwrap();
        let mut values: Vec<usize> = nearest.iter().map(|n| *n.value).collect();
        values.sort_unstable();
        assert_eq!(values, vec![2, 3]);
        assert!(nearest.iter().all(|n| n.distance == 0.5));

        let close = tree.range(&EuclideanDistance, &[2.5], 1.0).unwrap();
        assert_eq!(close.len(), 2);

        let empty = PhTreeF::<usize>::new(1).unwrap();
        assert!(empty.nearest_neighbor(3, &EuclideanDistance, None, &[0.0]).unwrap().is_empty());
    }

    #[test]
    fn test_phtree_integer_keys() {
        let mut tree = PhTree::new(2).unwrap();
        for x in 0..10_u64 {
            for y in 0..10_u64 {
                let _ = tree.put(&[x, y], x * 10 + y).unwrap();
            }
        }
        let nearest = tree.nearest_neighbor(1, &KeyEuclidean, None, &[4, 4]).unwrap();
        assert_eq!(nearest.len(), 1);
        assert_eq!(*nearest[0].value, 44);

        // the four axis neighbors tie at distance 1
        let ring = tree.nearest_neighbor(2, &KeyEuclidean, None, &[4, 4]).unwrap();
        assert_eq!(ring.len(), 5);
        assert!(ring[1..].iter().all(|n| n.distance == 1.0));
    }
}
