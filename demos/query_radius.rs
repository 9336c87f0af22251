//! Find every point within a radius, under two distance functions.
use spatial_knn::prelude::*;

fn main() {
    let relation = VectorRelation::from_vectors([[0.0, 0.0], [1.0, 1.0], [2.0, 0.0], [3.0, 3.0], [0.0, 2.5]]).unwrap();
    let tree = RStarTree::from_relation(&relation, TreeConfig::default()).unwrap();

    let euclidean = tree.range(&[0.0, 0.0], 2.0, &EuclideanDistance).unwrap();
    println!("within 2.0 (euclidean): {:?}", euclidean.ids());

    let manhattan = tree.range(&[0.0, 0.0], 2.0, &ManhattanDistance).unwrap();
    println!("within 2.0 (manhattan): {:?}", manhattan.ids());

    // Same query, expressed by the id of a stored point
    let around = tree.query(&MaximumDistance).range_by_id(&relation, ObjectId(1), 1.0).unwrap();
    println!("within 1.0 of {} (maximum): {:?}", ObjectId(1), around.ids());
}
