use crate::features::FeatureRow;

/// Restrict and reorder `row` to exactly `expected`, filling absent names
/// with zero. Names the model does not know are dropped.
pub fn align<S: AsRef<str>>(row: &FeatureRow, expected: &[S]) -> FeatureRow {
    let mut aligned = FeatureRow::with_capacity(expected.len());
    for name in expected {
        let name = name.as_ref();
        aligned.insert(name, row.get(name).unwrap_or(0.0));
    }
    aligned
}

/// Expected names the row does not carry.
pub fn missing<'a, S: AsRef<str>>(row: &FeatureRow, expected: &'a [S]) -> Vec<&'a str> {
    expected
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| !row.contains(name))
        .collect()
}

/// Row names the model does not expect.
pub fn extra<'a, S: AsRef<str>>(row: &'a FeatureRow, expected: &[S]) -> Vec<&'a str> {
    row.names()
        .filter(|name| !expected.iter().any(|e| e.as_ref() == *name))
        .collect()
}
