/// Scale `v` to unit Euclidean length. A zero vector is left as is.
pub(crate) fn normalize_l2(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_l2;

    #[test]
    fn scales_to_unit_length_and_keeps_zero() {
        let mut v = vec![0.0, 3.0, 0.0, -4.0];
        normalize_l2(&mut v);
        assert_eq!(v, vec![0.0, 0.6, 0.0, -0.8]);

        let mut zero = vec![0.0; 8];
        normalize_l2(&mut zero);
        assert!(zero.iter().all(|x| *x == 0.0));
    }
}
