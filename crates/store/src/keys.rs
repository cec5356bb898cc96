// This file is part of Wharf.
//
// Wharf is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Wharf is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Wharf.
// If not, see https://www.gnu.org/licenses/.

/// Reserved separator joining key and value segments. Segments must not
/// contain it.
pub const SEPARATOR: &str = ":";

/// Join segments into a namespaced key or a composite value
pub fn join_values<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|s| s.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Split a composite value back into its segments
pub fn split_values(joined: &str) -> Vec<&str> {
    joined.split(SEPARATOR).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = join_values(["mempool", "0xabc", "0x1"]);
        assert_eq!(key, "mempool:0xabc:0x1");
        assert_eq!(split_values(&key), vec!["mempool", "0xabc", "0x1"]);
    }
}
