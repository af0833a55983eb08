/// Default avatars for new principals
///
/// Points at the ui-avatars.com renderer, which draws the principal's
/// initials on a colored background.

use rand::seq::SliceRandom;
use rand::thread_rng;

const AVATAR_SERVICE_URL: &str = "https://ui-avatars.com/api/";

const BACKGROUND_COLORS: [&str; 8] = [
    "1abc9c", "2ecc71", "3498db", "9b59b6", "34495e", "16a085", "27ae60", "2980b9",
];

pub fn generate_avatar_url(full_name: &str) -> String {
    let background = BACKGROUND_COLORS
        .choose(&mut thread_rng())
        .copied()
        .unwrap_or(BACKGROUND_COLORS[0]);

    format!(
        "{}?name={}&size=256&background={}&color=ffffff&bold=true",
        AVATAR_SERVICE_URL,
        urlencoding::encode(full_name),
        background
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_url_encodes_name() {
        let url = generate_avatar_url("Alice Liddell");

        assert!(url.starts_with("https://ui-avatars.com/api/?name=Alice%20Liddell&size=256"));
        assert!(url.ends_with("&color=ffffff&bold=true"));
    }

    #[test]
    fn test_avatar_background_is_from_palette() {
        let url = generate_avatar_url("Bob");
        let background = url
            .split('&')
            .find_map(|part| part.strip_prefix("background="))
            .unwrap();

        assert!(BACKGROUND_COLORS.contains(&background));
    }
}
