//! Nearest neighbor and window queries on a PH-tree over f64 points.
use spatial_knn::phtree::PhDimFilter;
use spatial_knn::prelude::*;

fn main() {
    let mut tree = PhTreeF::new(3).unwrap();
    let _ = tree.put(&[1.0, 1.0, 0.0], "a").unwrap();
    let _ = tree.put(&[-2.0, 0.5, 9.0], "b").unwrap();
    let _ = tree.put(&[3.0, -1.0, 1.0], "c").unwrap();
    let _ = tree.put(&[1.5, 1.5, -4.0], "d").unwrap();

    let nearest = tree.nearest_neighbor(2, &EuclideanDistance, None, &[0.0, 0.0, 0.0]).unwrap();
    for n in &nearest {
        println!("{} at {:?}, distance {:.3}", n.value, n.point, n.distance);
    }

    // Ignore the third dimension
    let plane = PhDimFilter::only(3, &[0, 1]).unwrap();
    let flat = tree.nearest_neighbor(1, &EuclideanDistance, Some(&plane), &[1.4, 1.4, 100.0]).unwrap();
    println!("closest in the xy plane: {}", flat[0].value);

    let window = tree.query_window(&[0.0, -2.0, -5.0], &[4.0, 2.0, 2.0]).unwrap();
    println!("{} points in the window", window.len());
}
