use nalgebra::DVector;

// ─────────────────────────────────────────────
// DVector 上的排序與去重
// ─────────────────────────────────────────────
//
// nalgebra 沒有提供 argsort / unique，這裡補上 segment function
// 對齊 exp coef 時需要的兩個操作。比較一律使用 f64::total_cmp，
// 相等判斷則使用精確的 `==`（不加容忍值）。

/// 回傳使 `values` 遞增排列的索引（穩定排序）。
pub fn argsort(values: &DVector<f64>) -> Vec<usize> {
    let mut index: Vec<usize> = (0..values.len()).collect();
    index.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
    index
}

/// `unique` 的結果。
///
/// - `values`：遞增且兩兩相異的值
/// - `inverse[i]`：原始第 i 個元素在 `values` 中的位置
/// - `counts[k]`：`values[k]` 在原始向量中出現的次數
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueValues {
    pub values: DVector<f64>,
    pub inverse: Vec<usize>,
    pub counts: Vec<usize>,
}

impl UniqueValues {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_duplicates(&self) -> bool {
        self.values.len() < self.inverse.len()
    }
}

pub fn unique(values: &DVector<f64>) -> UniqueValues {
    let order = argsort(values);
    let mut distinct: Vec<f64> = Vec::with_capacity(values.len());
    let mut inverse = vec![0_usize; values.len()];
    let mut counts: Vec<usize> = Vec::with_capacity(values.len());

    for &i in &order {
        let v = values[i];
        // -0.0 與 0.0 以 `==` 視為同一值
        match distinct.last() {
            Some(&last) if last == v => {
                let k = distinct.len() - 1;
                counts[k] += 1;
                inverse[i] = k;
            }
            _ => {
                distinct.push(v);
                counts.push(1);
                inverse[i] = distinct.len() - 1;
            }
        }
    }

    UniqueValues {
        values: DVector::from_vec(distinct),
        inverse,
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argsort_is_stable_and_ascending() {
        let v = DVector::from_vec(vec![3.0, -1.0, 3.0, 0.5]);
        assert_eq!(argsort(&v), vec![1, 3, 0, 2]);
    }

    #[test]
    fn unique_reports_inverse_and_counts() {
        let v = DVector::from_vec(vec![1.0, 0.0, 1.0, -2.0, 0.0, 1.0]);
        let u = unique(&v);
        assert_eq!(u.values, DVector::from_vec(vec![-2.0, 0.0, 1.0]));
        assert_eq!(u.inverse, vec![2, 1, 2, 0, 1, 2]);
        assert_eq!(u.counts, vec![1, 2, 3]);
        assert!(u.has_duplicates());
    }

    #[test]
    fn unique_merges_signed_zeros() {
        let v = DVector::from_vec(vec![0.0, -0.0]);
        let u = unique(&v);
        assert_eq!(u.len(), 1);
        assert_eq!(u.counts, vec![2]);
        assert_eq!(u.inverse, vec![0, 0]);
    }

    #[test]
    fn unique_of_distinct_values_keeps_all() {
        let v = DVector::from_vec(vec![2.0, 1.0]);
        let u = unique(&v);
        assert!(!u.has_duplicates());
        assert_eq!(u.inverse, vec![1, 0]);
    }
}
