//! Selector catalog
//!
//! Pure data: every locator, attribute pattern and page text the built-in
//! probes rely on. Defaults target the twitter.com web client; any key can
//! be overridden from the configuration file without restating the rest.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// All selectors used by the probe suite
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorCatalog {
    /// Free-form marker of when the selectors were last checked against the site
    pub last_update_time: String,
    pub pages: Pages,
    pub login: LoginSelectors,
    pub profile: ProfileSelectors,
    pub post: PostSelectors,
    pub search: SearchSelectors,
    pub follow: FollowSelectors,
    pub reply: ReplySelectors,
    pub bookmark: ToggleSpec,
    pub like: ToggleSpec,
    pub repost: ToggleSpec,
}

impl Default for SelectorCatalog {
    fn default() -> Self {
        Self {
            last_update_time: "1695106363005".to_string(),
            pages: Pages::default(),
            login: LoginSelectors::default(),
            profile: ProfileSelectors::default(),
            post: PostSelectors::default(),
            search: SearchSelectors::default(),
            follow: FollowSelectors::default(),
            reply: ReplySelectors::default(),
            bookmark: ToggleSpec {
                scope: FIRST_ARTICLE.to_string(),
                control: r#"div[data-testid$="ookmark"]"#.to_string(),
                attribute: "aria-label".to_string(),
                target_suffix: "Bookmarked".to_string(),
                origin_suffix: "Bookmark".to_string(),
                confirm_forward: None,
                confirm_reverse: None,
            },
            like: ToggleSpec {
                scope: FIRST_ARTICLE.to_string(),
                control: r#"div[data-testid$="like"]"#.to_string(),
                attribute: "aria-label".to_string(),
                target_suffix: "Liked".to_string(),
                origin_suffix: "Like".to_string(),
                confirm_forward: None,
                confirm_reverse: None,
            },
            repost: ToggleSpec {
                scope: FIRST_ARTICLE.to_string(),
                control: r#"div[data-testid$="retweet"]"#.to_string(),
                attribute: "data-testid".to_string(),
                target_suffix: "unretweet".to_string(),
                origin_suffix: "retweet".to_string(),
                confirm_forward: Some(
                    r#"#react-root div[data-testid="retweetConfirm"]"#.to_string(),
                ),
                confirm_reverse: Some(
                    r#"#react-root div[data-testid="unretweetConfirm"]"#.to_string(),
                ),
            },
        }
    }
}

const FIRST_ARTICLE: &str = r#"article[data-testid="tweet"][tabindex="-1"][role="article"]"#;

/// Page paths, relative to the configured base URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Pages {
    pub login: String,
    pub home: String,
    pub explore: String,
    /// Regex the URL must match once a single post is open
    pub status_url_pattern: String,
}

impl Default for Pages {
    fn default() -> Self {
        Self {
            login: "/i/flow/login".to_string(),
            home: "/home".to_string(),
            explore: "/explore".to_string(),
            status_url_pattern: r"^https://(twitter|x)\.com/\w+/status/\d+$".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginSelectors {
    pub username_input: String,
    pub password_input: String,
    pub account_switcher: String,
    /// Cookie whose presence means the stored session is still logged in
    pub auth_cookie: String,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            username_input: r#"input[autocomplete="username"]"#.to_string(),
            password_input: r#"input[autocomplete="current-password"]"#.to_string(),
            account_switcher: r#"div[data-testid="SideNav_AccountSwitcher_Button"]"#.to_string(),
            auth_cookie: "auth_token".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileSelectors {
    pub profile_link: String,
    pub user_name: String,
}

impl Default for ProfileSelectors {
    fn default() -> Self {
        Self {
            profile_link: r#"a[data-testid="AppTabBar_Profile_Link"]"#.to_string(),
            user_name: r#"div[data-testid="UserName"]"#.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PostSelectors {
    pub home_link: String,
    pub composer: String,
    pub submit: String,
    /// Region searched for the freshly posted greeting
    pub feed: String,
    pub status_notice: String,
    /// Notice text shown when the same content was already posted
    pub duplicate_text: String,
}

impl Default for PostSelectors {
    fn default() -> Self {
        Self {
            home_link: r#"a[data-testid="AppTabBar_Home_Link"]"#.to_string(),
            composer: r#"div[data-testid="tweetTextarea_0"]"#.to_string(),
            submit: r#"div[data-testid="tweetButtonInline"]"#.to_string(),
            feed: r#"div[data-testid="cellInnerDiv"]"#.to_string(),
            status_notice: r#"div[aria-live="assertive"][role="status"]"#.to_string(),
            duplicate_text: "You already said that".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchSelectors {
    pub explore_link: String,
    pub search_input: String,
    /// Text body of the first post in a result list
    pub first_result: String,
    /// Element that only exists once a single post is open
    pub reply_prompt: String,
    pub query: String,
}

impl Default for SearchSelectors {
    fn default() -> Self {
        Self {
            explore_link: r#"a[data-testid="AppTabBar_Explore_Link"]"#.to_string(),
            search_input: r#"input[data-testid="SearchBox_Search_Input"]"#.to_string(),
            first_result: r#"div[data-testid="cellInnerDiv"] article[data-testid="tweet"] div[data-testid="tweetText"]"#.to_string(),
            reply_prompt: "text=Post your reply".to_string(),
            query: "AI".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FollowSelectors {
    pub trending_avatar: String,
    pub follow_button: String,
    pub unfollow_marker: String,
    pub following_text: String,
}

impl Default for FollowSelectors {
    fn default() -> Self {
        Self {
            trending_avatar: r#"div[aria-label="Trending"] div[data-testid^="UserAvatar-Container"]"#.to_string(),
            follow_button: r#"div[aria-label="Home timeline"][tabindex="0"]:not([data-testid="sidebarColumn"]) div[role="button"][aria-label^="Follow"]"#.to_string(),
            unfollow_marker: r#"div[data-testid$="-unfollow"][aria-label^="Following"]"#.to_string(),
            following_text: "Following".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplySelectors {
    pub editable: String,
    pub submit: String,
    pub timeline: String,
    pub status_notice: String,
}

impl Default for ReplySelectors {
    fn default() -> Self {
        Self {
            editable: r#"div[contenteditable="true"]"#.to_string(),
            submit: r#"div[data-testid="tweetButtonInline"]"#.to_string(),
            timeline: r#"div[aria-label="Home timeline"]"#.to_string(),
            status_notice: r#"div[aria-live="assertive"]"#.to_string(),
        }
    }
}

/// A two-state control and the attribute suffixes that encode its states
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ToggleSpec {
    /// Container the control lives in
    pub scope: String,
    pub control: String,
    pub attribute: String,
    pub target_suffix: String,
    pub origin_suffix: String,
    /// Menu item to click after moving the control from origin to target
    pub confirm_forward: Option<String>,
    /// Menu item to click after moving the control from target back to origin
    pub confirm_reverse: Option<String>,
}

impl ToggleSpec {
    /// Full selector of the control
    pub fn selector(&self) -> String {
        if self.scope.is_empty() {
            self.control.clone()
        } else {
            format!("{} {}", self.scope, self.control)
        }
    }
}

impl SelectorCatalog {
    /// Defaults with a (possibly partial) YAML tree merged on top
    pub fn with_overrides(overrides: &serde_yaml::Value) -> Result<Self> {
        let mut merged = serde_yaml::to_value(Self::default())?;
        merge_yaml(&mut merged, overrides);
        serde_yaml::from_value(merged).context("Invalid selector overrides")
    }
}

fn merge_yaml(base: &mut serde_yaml::Value, overlay: &serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base), serde_yaml::Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Join a catalog path onto the base URL
pub fn page_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), path)
    }
}
