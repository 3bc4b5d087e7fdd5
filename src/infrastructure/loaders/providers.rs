//! Provider-specific URL construction.
//!
//! Each function rewrites a source path into the external provider's
//! optimization URL; none of them touch the local pipeline.

/// Builds an imgix URL with automatic format selection.
#[must_use]
pub fn imgix_url(prefix: &str, src: &str, width: u32, quality: u8) -> String {
    format!("{prefix}{src}?auto=format&fit=max&w={width}&q={quality}")
}

/// Builds a Cloudinary delivery URL with f_auto and width-limited crop.
#[must_use]
pub fn cloudinary_url(prefix: &str, src: &str, width: u32, quality: u8) -> String {
    let src = src.trim_start_matches('/');
    format!("{prefix}f_auto,c_limit,w_{width},q_{quality}/{src}")
}

/// Builds an Akamai Image Manager URL using the `imwidth` parameter.
#[must_use]
pub fn akamai_url(prefix: &str, src: &str, width: u32) -> String {
    format!("{prefix}{src}?imwidth={width}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imgix_url() {
        assert_eq!(
            imgix_url("https://example.imgix.net", "/hero.png", 1080, 75),
            "https://example.imgix.net/hero.png?auto=format&fit=max&w=1080&q=75"
        );
    }

    #[test]
    fn test_cloudinary_url_strips_leading_slash() {
        assert_eq!(
            cloudinary_url("https://res.cloudinary.com/demo/image/upload/", "/hero.png", 640, 60),
            "https://res.cloudinary.com/demo/image/upload/f_auto,c_limit,w_640,q_60/hero.png"
        );
    }

    #[test]
    fn test_akamai_url() {
        assert_eq!(
            akamai_url("https://images.example.com", "/hero.png", 828),
            "https://images.example.com/hero.png?imwidth=828"
        );
    }
}
