use chrono::NaiveDateTime;

/// Where one capture lands: `<base_root>/<user>/<YYYY-MM-DD>/<YYYY-MM-DD>-(<HH-MM-SS>).jpg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub base_root: String,
    pub user: String,
    pub date_folder: String,
    pub file_name: String,
}

impl Destination {
    pub fn at(base_root: &str, user: &str, captured_at: NaiveDateTime) -> Self {
        let date_folder = captured_at.format("%Y-%m-%d").to_string();
        let time_of_day = captured_at.format("%H-%M-%S").to_string();
        Self {
            base_root: base_root.to_string(),
            user: user.to_string(),
            file_name: format!("{date_folder}-({time_of_day}).jpg"),
            date_folder,
        }
    }

    /// Cumulative absolute paths for each directory level, outermost first.
    pub fn dir_levels(&self) -> [String; 3] {
        let root = normalize_root(&self.base_root);
        let user_dir = join(&root, &self.user);
        let date_dir = join(&user_dir, &self.date_folder);
        [root, user_dir, date_dir]
    }

    pub fn directory(&self) -> String {
        let [_, _, date_dir] = self.dir_levels();
        date_dir
    }

    pub fn remote_path(&self) -> String {
        join(&self.directory(), &self.file_name)
    }
}

fn normalize_root(root: &str) -> String {
    let trimmed = root.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn join(parent: &str, segment: &str) -> String {
    let segment = segment.trim_matches('/');
    if parent.ends_with('/') {
        format!("{parent}{segment}")
    } else {
        format!("{parent}/{segment}")
    }
}
