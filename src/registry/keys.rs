//! Key layout for the services subtree
//!
//! Every endpoint key has the form `<prefix>services/<service>/<address>`
//! with exactly two path segments after the services directory. The value
//! stored under such a key is empty; the key itself carries all semantic
//! data, which keeps range reads self-describing.

/// Root of the services subtree: `<prefix>services/`.
pub(crate) fn services_key(prefix: &str) -> String {
    format!("{prefix}services/")
}

/// Key prefix covering every endpoint of one service.
pub(crate) fn service_key(prefix: &str, service: &str) -> String {
    format!("{}{service}", services_key(prefix))
}

/// Full key for one endpoint of one service.
pub(crate) fn endpoint_key(prefix: &str, service: &str, address: &str) -> String {
    format!("{}/{address}", service_key(prefix, service))
}

/// Parse an endpoint key back into its (service, address) pair.
///
/// Returns `None` for keys outside the services subtree or without both
/// path segments.
pub(crate) fn parts_from_key(prefix: &str, key: &str) -> Option<(String, String)> {
    let rest = key.strip_prefix(&services_key(prefix))?;
    let (service, address) = rest.split_once('/')?;
    if service.is_empty() || address.is_empty() {
        return None;
    }
    Some((service.to_string(), address.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keys_round_trip() {
        for (service, address) in [
            ("web", "192.168.1.12"),
            ("data-access", "10.4.0.7:5432"),
            ("a", "b"),
        ] {
            let key = endpoint_key("gsr/", service, address);
            assert_eq!(
                parts_from_key("gsr/", &key),
                Some((service.to_string(), address.to_string())),
                "key {key:?}"
            );
        }
    }

    #[test]
    fn layout_matches_the_wire_format() {
        assert_eq!(services_key("gsr/"), "gsr/services/");
        assert_eq!(service_key("gsr/", "web"), "gsr/services/web");
        assert_eq!(
            endpoint_key("gsr/", "web", "192.168.1.12"),
            "gsr/services/web/192.168.1.12"
        );
    }

    #[test]
    fn keys_outside_the_subtree_do_not_parse() {
        assert_eq!(parts_from_key("gsr/", "other/services/web/10.0.0.1"), None);
        assert_eq!(parts_from_key("gsr/", "gsr/leases/web/10.0.0.1"), None);
    }

    #[test]
    fn keys_missing_a_segment_do_not_parse() {
        assert_eq!(parts_from_key("gsr/", "gsr/services/web"), None);
        assert_eq!(parts_from_key("gsr/", "gsr/services/web/"), None);
        assert_eq!(parts_from_key("gsr/", "gsr/services//10.0.0.1"), None);
    }

    #[test]
    fn custom_prefixes_are_honored() {
        let key = endpoint_key("deploy/staging/", "web", "10.0.0.1:80");
        assert_eq!(key, "deploy/staging/services/web/10.0.0.1:80");
        assert_eq!(
            parts_from_key("deploy/staging/", &key),
            Some(("web".to_string(), "10.0.0.1:80".to_string()))
        );
    }
}
