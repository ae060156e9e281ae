//! 应用名到 Android 包名的静态映射表

/// 支持的应用（显示名, 包名）
pub const APP_PACKAGES: &[(&str, &str)] = &[
    // 系统应用
    ("Settings", "com.android.settings"),
    ("Clock", "com.android.deskclock"),
    ("Contacts", "com.android.contacts"),
    ("Files", "com.android.fileexplorer"),
    ("File Manager", "com.android.fileexplorer"),
    ("AudioRecorder", "com.android.soundrecorder"),
    // 浏览器
    ("Chrome", "com.android.chrome"),
    ("Google Chrome", "com.android.chrome"),
    // Google 系
    ("Gmail", "com.google.android.gm"),
    ("Google Mail", "com.google.android.gm"),
    ("Google Files", "com.google.android.apps.nbu.files"),
    ("Google Calendar", "com.google.android.calendar"),
    ("Google Chat", "com.google.android.apps.dynamite"),
    ("Google Clock", "com.google.android.deskclock"),
    ("Google Contacts", "com.google.android.contacts"),
    ("Google Docs", "com.google.android.apps.docs.editors.docs"),
    ("Google Drive", "com.google.android.apps.docs"),
    ("Google Fit", "com.google.android.apps.fitness"),
    ("Google Keep", "com.google.android.keep"),
    ("Google Maps", "com.google.android.apps.maps"),
    ("Google Play Books", "com.google.android.apps.books"),
    ("Google Play Store", "com.android.vending"),
    ("Google Slides", "com.google.android.apps.docs.editors.slides"),
    ("Google Tasks", "com.google.android.apps.tasks"),
    // 社交与通讯
    ("Telegram", "org.telegram.messenger"),
    ("WhatsApp", "com.whatsapp"),
    ("WeChat", "com.tencent.mm"),
    ("Twitter", "com.twitter.android"),
    ("X", "com.twitter.android"),
    ("Reddit", "com.reddit.frontpage"),
    ("Quora", "com.quora.android"),
    // 视频与娱乐
    ("TikTok", "com.zhiliaoapp.musically"),
    ("VLC", "org.videolan.vlc"),
    // 旅行与预订
    ("Booking", "com.booking"),
    ("Booking.com", "com.booking"),
    ("Expedia", "com.expedia.bookings"),
    // 购物
    ("Temu", "com.einnovation.temu"),
    // 学习
    ("Duolingo", "com.duolingo"),
    // 地图导航
    ("OsmAnd", "net.osmand"),
    // 效率工具
    ("Joplin", "net.cozic.joplin"),
    // 音乐
    ("RetroMusic", "code.name.monkey.retromusic"),
    ("PiMusicPlayer", "com.Project100Pi.themusicplayer"),
    // 餐饮
    ("McDonald's", "com.mcdonalds.app"),
    // 财务
    ("Bluecoins", "com.rammigsoftware.bluecoins"),
    // 健康
    ("Broccoli", "com.flauschcode.broccoli"),
];

/// 将应用显示名转换为包名
///
/// 先精确匹配，再大小写不敏感匹配；已经是包名格式（含 `.`）直接放行。
pub fn get_package_name(app_name: &str) -> Option<String> {
    if let Some((_, package)) = APP_PACKAGES.iter().find(|(name, _)| *name == app_name) {
        return Some(package.to_string());
    }
    let lower = app_name.to_lowercase();
    if let Some((_, package)) = APP_PACKAGES
        .iter()
        .find(|(name, _)| name.to_lowercase() == lower)
    {
        return Some(package.to_string());
    }
    if app_name.contains('.') {
        return Some(app_name.to_string());
    }
    None
}

/// 由包名反查应用显示名
pub fn get_app_name(package_name: &str) -> Option<&'static str> {
    APP_PACKAGES
        .iter()
        .find(|(_, package)| *package == package_name)
        .map(|(name, _)| *name)
}

/// 全部受支持的应用名
pub fn list_supported_apps() -> Vec<&'static str> {
    APP_PACKAGES.iter().map(|(name, _)| *name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_lookup() {
        assert_eq!(
            get_package_name("Chrome").as_deref(),
            Some("com.android.chrome")
        );
    }

    #[test]
    fn test_case_insensitive_lookup() {
        assert_eq!(
            get_package_name("chrome").as_deref(),
            Some("com.android.chrome")
        );
        assert_eq!(
            get_package_name("TELEGRAM").as_deref(),
            Some("org.telegram.messenger")
        );
    }

    #[test]
    fn test_package_passthrough() {
        assert_eq!(
            get_package_name("com.example.custom").as_deref(),
            Some("com.example.custom")
        );
    }

    #[test]
    fn test_unknown_app() {
        assert_eq!(get_package_name("NotAnApp"), None);
    }

    #[test]
    fn test_reverse_lookup() {
        assert_eq!(get_app_name("com.whatsapp"), Some("WhatsApp"));
        assert_eq!(get_app_name("com.example.none"), None);
    }

    #[test]
    fn test_list_is_not_empty() {
        assert!(list_supported_apps().len() > 30);
    }
}
