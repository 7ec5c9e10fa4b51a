pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse a comma-separated list of numeric role ids, naming the bad token.
pub fn parse_role_ids(s: &str) -> anyhow::Result<Vec<u64>> {
    split_csv(s)
        .into_iter()
        .map(|token| {
            token
                .parse::<u64>()
                .map_err(|_| anyhow::anyhow!("invalid role id `{token}`"))
        })
        .collect()
}
