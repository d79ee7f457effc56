pub const BANNER: &str = r#"|CS|11 _                                 _
|11| |_ ___ _ __ _ __ ___   __ _  __ _| |_ ___
|03| __/ _ \ '__| '_ ` _ \ / _` |/ _` | __/ _ \
|03| ||  __/ |  | | | | | | (_| | (_| | ||  __/
|09 \__\___|_|  |_| |_| |_|\__, |\__,_|\__\___|
|09                        |___/
"#;

pub const ENTRY: &str = "|CR|07Welcome to |15|OT|07.|CR|08------------------------------------------------|CR";

/// Banner plus the entry line with the board name filled in.
pub fn welcome(bbs_name: &str) -> String {
    format!("{BANNER}{}", ENTRY.replace("|OT", bbs_name))
}
