// otpauth provisioning uris, as produced by qr codes and "can't scan?"
// provisioning screens:
//
//   otpauth://totp/{issuer}:{account}?secret={base32}&issuer={issuer}

const FALLBACK_ACCOUNT: &str = "Default Account";

// keep the rfc 3986 unreserved set, encode everything else
const LABEL_ENCODE: &percent_encoding::AsciiSet =
    &percent_encoding::NON_ALPHANUMERIC
        .remove(b'.')
        .remove(b'-')
        .remove(b'_')
        .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri {
    pub issuer: String,
    pub account: String,
    pub secret: String,
}

/// Parses an otpauth uri. Returns `None` for anything that isn't a totp
/// provisioning uri with a secret; malformed input is "no code found",
/// never an error.
pub fn parse(uri: &str) -> Option<ParsedUri> {
    let url = url::Url::parse(uri).ok()?;
    if url.scheme() != "otpauth" || url.host_str() != Some("totp") {
        return None;
    }

    // split the raw label on the first colon before percent-decoding, so
    // an encoded colon inside a name survives a round-trip
    let label = url.path().strip_prefix('/').unwrap_or_else(|| url.path());
    let (raw_issuer, raw_account) = match label.split_once(':') {
        Some((issuer, account)) => (issuer, account),
        None => ("", label),
    };
    let issuer = decode_label_part(raw_issuer)?;
    let account = decode_label_part(raw_account)?;

    let mut secret = None;
    let mut query_issuer = None;
    for (key, value) in url.query_pairs() {
        match &*key {
            "secret" => secret = Some(value.into_owned()),
            "issuer" => query_issuer = Some(value.into_owned()),
            _ => {}
        }
    }
    let secret = secret.filter(|secret| !secret.is_empty())?;

    let issuer = if issuer.is_empty() {
        query_issuer
            .filter(|issuer| !issuer.is_empty())
            .unwrap_or_else(|| crate::record::UNKNOWN_ISSUER.to_string())
    } else {
        issuer
    };
    let account = if account.is_empty() {
        if issuer == crate::record::UNKNOWN_ISSUER {
            FALLBACK_ACCOUNT.to_string()
        } else {
            issuer.clone()
        }
    } else {
        account
    };

    Some(ParsedUri {
        issuer,
        account,
        secret,
    })
}

/// The inverse of `parse`. The issuer rides in both the label and the
/// query so that consumers reading either spot agree.
pub fn format(issuer: &str, account: &str, secret: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}",
        percent_encoding::utf8_percent_encode(issuer, LABEL_ENCODE),
        percent_encoding::utf8_percent_encode(account, LABEL_ENCODE),
        secret,
        percent_encoding::utf8_percent_encode(issuer, LABEL_ENCODE),
    )
}

fn decode_label_part(raw: &str) -> Option<String> {
    Some(
        percent_encoding::percent_decode_str(raw)
            .decode_utf8()
            .ok()?
            .into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(issuer: &str, account: &str, secret: &str) -> ParsedUri {
        ParsedUri {
            issuer: issuer.to_string(),
            account: account.to_string(),
            secret: secret.to_string(),
        }
    }

    #[test]
    fn full_label() {
        assert_eq!(
            parse(
                "otpauth://totp/Google:alice@example.com?secret=JBSWY3DPEHPK3PXP"
            ),
            Some(parsed(
                "Google",
                "alice@example.com",
                "JBSWY3DPEHPK3PXP"
            ))
        );
    }

    #[test]
    fn not_totp() {
        assert_eq!(parse("not-a-uri"), None);
        assert_eq!(parse("otpauth://totp/x"), None);
        assert_eq!(parse("otpauth://hotp/x?secret=JBSWY3DP"), None);
        assert_eq!(parse("https://totp/x?secret=JBSWY3DP"), None);
        assert_eq!(parse("otpauth://totp/x?secret="), None);
    }

    #[test]
    fn label_without_colon_is_the_account() {
        assert_eq!(
            parse("otpauth://totp/alice?secret=JBSWY3DP&issuer=Example"),
            Some(parsed("Example", "alice", "JBSWY3DP"))
        );
        assert_eq!(
            parse("otpauth://totp/alice?secret=JBSWY3DP"),
            Some(parsed("Unknown", "alice", "JBSWY3DP"))
        );
    }

    #[test]
    fn label_issuer_wins_over_query_issuer() {
        assert_eq!(
            parse("otpauth://totp/Label:alice?secret=JBSWY3DP&issuer=Query"),
            Some(parsed("Label", "alice", "JBSWY3DP"))
        );
    }

    #[test]
    fn empty_account_defaults() {
        assert_eq!(
            parse("otpauth://totp/Example:?secret=JBSWY3DP"),
            Some(parsed("Example", "Example", "JBSWY3DP"))
        );
        assert_eq!(
            parse("otpauth://totp/?secret=JBSWY3DP"),
            Some(parsed("Unknown", "Default Account", "JBSWY3DP"))
        );
    }

    #[test]
    fn labels_are_percent_decoded() {
        assert_eq!(
            parse(
                "otpauth://totp/Big%20Corp:alice%40example.com?secret=JBSWY3DP"
            ),
            Some(parsed("Big Corp", "alice@example.com", "JBSWY3DP"))
        );
    }

    #[test]
    fn format_encodes_labels() {
        assert_eq!(
            format("Google", "alice@example.com", "JBSWY3DPEHPK3PXP"),
            "otpauth://totp/Google:alice%40example.com?secret=JBSWY3DPEHPK3PXP&issuer=Google"
        );
    }

    #[test]
    fn round_trips() {
        for record in [
            parsed("Google", "alice@example.com", "JBSWY3DPEHPK3PXP"),
            parsed("Big Corp", "bob carol", "JBSWY3DP"),
            parsed("a:b", "c:d", "JBSWY3DP"),
            parsed("Unknown", "Default Account", "JBSWY3DP"),
        ] {
            let uri =
                format(&record.issuer, &record.account, &record.secret);
            assert_eq!(parse(&uri), Some(record), "uri {uri}");
        }
    }
}
