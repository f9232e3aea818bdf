use rand::Rng;

/// Alphanumeric string of the given length. Used for ephemeral
/// JWT signing secrets.
pub fn random_string(length: usize) -> String {
  rand::rng()
    .sample_iter(rand::distr::Alphanumeric)
    .take(length)
    .map(char::from)
    .collect()
}
