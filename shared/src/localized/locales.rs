//! Locale names, short names and Windows locale identifiers.
//!
//! Gadget packages written for Windows keep localized resources in
//! directories named after the decimal locale identifier (`1033/` for
//! en-US), so the table maps both ways between those and locale names.

use tracing::debug;

/// One row of the locale table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocaleInfo {
    /// Full locale name, e.g. `zh-CN`
    pub name: &'static str,
    /// Short name used when the language alone is unambiguous, e.g. `en`
    pub short_name: Option<&'static str>,
    /// Windows locale identifier (LCID); zero when Windows has none
    pub windows_id: u16,
}

const fn locale(name: &'static str, short_name: Option<&'static str>, windows_id: u16) -> LocaleInfo {
    LocaleInfo {
        name,
        short_name,
        windows_id,
    }
}

/// Sorted by name (byte order) for binary search.
pub static LOCALES: &[LocaleInfo] = &[
    locale("af-ZA", Some("af"), 0x0436),
    locale("am-ET", Some("am"), 0x045e),
    locale("ar-AE", None, 0x3801),
    locale("ar-BH", None, 0x3c01),
    locale("ar-DZ", None, 0x1401),
    locale("ar-EG", None, 0x0c01),
    locale("ar-IQ", None, 0x0801),
    locale("ar-JO", None, 0x2c01),
    locale("ar-KW", None, 0x3401),
    locale("ar-LB", None, 0x3001),
    locale("ar-LY", None, 0x1001),
    locale("ar-MA", None, 0x1801),
    locale("ar-OM", None, 0x2001),
    locale("ar-QA", None, 0x4001),
    locale("ar-SA", None, 0x0401),
    locale("ar-SY", None, 0x2801),
    locale("ar-TN", None, 0x1c01),
    locale("ar-YE", None, 0x2401),
    locale("arn-CL", Some("arn"), 0x047a),
    locale("as-IN", Some("as"), 0x044d),
    locale("az-Cyrl-AZ", None, 0x082c),
    locale("az-Latn-AZ", None, 0x042c),
    locale("ba-RU", Some("ba"), 0x046d),
    locale("be-BY", Some("be"), 0x0423),
    locale("bg-BG", Some("bg"), 0x0402),
    locale("bn-BD", None, 0x0845),
    locale("bn-IN", Some("bn"), 0x0445),
    locale("bo-CN", Some("bo"), 0x0451),
    locale("br-FR", Some("br"), 0x047e),
    // Latin is the implied script for Bosnian.
    locale("bs-BA", Some("bs"), 0x141a),
    locale("bs-Cyrl-BA", None, 0x201a),
    locale("bs-Latn-BA", None, 0x141a),
    locale("ca-ES", Some("ca"), 0x0403),
    locale("cs-CZ", Some("cs"), 0x0405),
    locale("cy-GB", Some("cy"), 0x0452),
    locale("da-DK", Some("da"), 0x0406),
    locale("de-AT", None, 0x0c07),
    locale("de-CH", None, 0x0807),
    locale("de-DE", Some("de"), 0x0407),
    locale("de-LI", None, 0x1407),
    locale("de-LU", None, 0x1007),
    locale("dsb-DE", Some("dsb"), 0x082e),
    locale("dv-MV", Some("dv"), 0x0465),
    locale("el-GR", Some("el"), 0x0408),
    locale("en-029", None, 0x2409),
    locale("en-AU", None, 0x0c09),
    locale("en-BZ", None, 0x2809),
    locale("en-CA", None, 0x1009),
    locale("en-GB", None, 0x0809),
    locale("en-IE", None, 0x1809),
    locale("en-IN", None, 0x4009),
    locale("en-JM", None, 0x2009),
    locale("en-MY", None, 0x4409),
    locale("en-NZ", None, 0x1409),
    locale("en-PH", None, 0x3409),
    locale("en-SG", None, 0x4809),
    locale("en-TT", None, 0x2c09),
    locale("en-US", Some("en"), 0x0409),
    locale("en-ZA", None, 0x1c09),
    locale("en-ZW", None, 0x3009),
    locale("es-AR", None, 0x2c0a),
    locale("es-BO", None, 0x400a),
    locale("es-CL", None, 0x340a),
    locale("es-CO", None, 0x240a),
    locale("es-CR", None, 0x140a),
    locale("es-DO", None, 0x1c0a),
    locale("es-EC", None, 0x300a),
    locale("es-ES", Some("es"), 0x0c0a),
    locale("es-ES-tradnl", None, 0x040a),
    locale("es-GT", None, 0x100a),
    locale("es-HN", None, 0x480a),
    locale("es-MX", None, 0x080a),
    locale("es-NI", None, 0x4c0a),
    locale("es-PA", None, 0x180a),
    locale("es-PE", None, 0x280a),
    locale("es-PR", None, 0x500a),
    locale("es-PY", None, 0x3c0a),
    locale("es-SV", None, 0x440a),
    locale("es-US", None, 0x540a),
    locale("es-UY", None, 0x380a),
    locale("es-VE", None, 0x200a),
    locale("et-EE", Some("et"), 0x0425),
    locale("eu-ES", Some("eu"), 0x042d),
    locale("fa-IR", Some("fa"), 0x0429),
    locale("fi-FI", Some("fi"), 0x040b),
    locale("fil-PH", Some("fil"), 0x0464),
    locale("fo-FO", Some("fo"), 0x0438),
    locale("fr-BE", None, 0x080c),
    locale("fr-CA", None, 0x0c0c),
    locale("fr-CH", None, 0x100c),
    locale("fr-FR", Some("fr"), 0x040c),
    locale("fr-LU", None, 0x140c),
    locale("fr-MC", None, 0x180c),
    locale("fy-NL", None, 0x0462),
    locale("ga-IE", Some("ga"), 0x083c),
    locale("gbz-AF", Some("gbz"), 0x048c),
    locale("gl-ES", Some("gl"), 0x0456),
    locale("gsw-FR", Some("gsw"), 0x0484),
    locale("gu-IN", Some("gu"), 0x0447),
    locale("ha-Latn-NG", None, 0x0468),
    locale("he-IL", Some("he"), 0x040d),
    locale("hi-IN", Some("hi"), 0x0439),
    locale("hr-BA", None, 0x101a),
    locale("hr-HR", Some("hr"), 0x041a),
    locale("hu-HU", Some("hu"), 0x040e),
    locale("hy-AM", Some("hy"), 0x042b),
    locale("id-ID", Some("id"), 0x0421),
    locale("ig-NG", Some("ig"), 0x0470),
    locale("ii-CN", Some("ii"), 0x0478),
    locale("is-IS", Some("is"), 0x040f),
    locale("it-CH", None, 0x0810),
    locale("it-IT", Some("it"), 0x0410),
    locale("iu-Cans-CA", None, 0x045d),
    locale("iu-Latn-CA", None, 0x085d),
    locale("ja-JP", Some("ja"), 0x0411),
    locale("ka-GE", Some("ka"), 0x0437),
    locale("kh-KH", Some("kh"), 0x0453),
    locale("kk-KZ", Some("kk"), 0x043f),
    locale("kl-GL", Some("kl"), 0x046f),
    locale("kn-IN", Some("kn"), 0x044b),
    locale("ko-KR", Some("ko"), 0x0412),
    locale("kok-IN", Some("kok"), 0x0457),
    locale("ky-KG", Some("ky"), 0x0440),
    locale("lb-LU", Some("lb"), 0x046e),
    locale("lo-LA", Some("lo"), 0x0454),
    locale("lt-LT", Some("lt"), 0x0427),
    locale("lv-LV", Some("lv"), 0x0426),
    locale("mi-NZ", Some("mi"), 0x0481),
    locale("mk-MK", Some("mk"), 0x042f),
    locale("ml-IN", Some("ml"), 0x044c),
    locale("mn-Cyrl-MN", None, 0x0450),
    locale("mn-Mong-CN", None, 0x0850),
    locale("moh-CA", Some("moh"), 0x047c),
    locale("mr-IN", Some("mr"), 0x044e),
    locale("ms-BN", None, 0x083e),
    locale("ms-MY", Some("ms"), 0x043e),
    locale("mt-MT", Some("mt"), 0x043a),
    locale("nb-NO", Some("nb"), 0x0414),
    locale("ne-NP", Some("ne"), 0x0461),
    locale("nl-BE", None, 0x0813),
    locale("nl-NL", Some("nl"), 0x0413),
    locale("nn-NO", Some("nn"), 0x0814),
    locale("no-NO", Some("no"), 0x0414),
    locale("ns-ZA", Some("ns"), 0x046c),
    locale("oc-FR", Some("oc"), 0x0482),
    locale("or-IN", Some("or"), 0x0448),
    locale("pa-IN", Some("pa"), 0x0446),
    locale("pl-PL", Some("pl"), 0x0415),
    locale("ps-AF", Some("ps"), 0x0463),
    // Neither Portuguese variant owns the short name.
    locale("pt-BR", None, 0x0416),
    locale("pt-PT", None, 0x0816),
    locale("qut-GT", Some("qut"), 0x0486),
    locale("quz-BO", None, 0x046b),
    locale("quz-EC", None, 0x086b),
    locale("quz-PE", None, 0x0c6b),
    locale("rm-CH", Some("rm"), 0x0417),
    locale("ro-RO", Some("ro"), 0x0418),
    locale("ru-RU", Some("ru"), 0x0419),
    locale("rw-RW", Some("rw"), 0x0487),
    locale("sa-IN", Some("sa"), 0x044f),
    locale("sah-RU", Some("sah"), 0x0485),
    locale("se-FI", None, 0x0c3b),
    locale("se-NO", None, 0x043b),
    locale("se-SE", Some("se"), 0x083b),
    locale("si-LK", Some("si"), 0x045b),
    locale("sk-SK", Some("sk"), 0x041b),
    locale("sl-SI", Some("sl"), 0x0424),
    locale("sma-NO", None, 0x183b),
    locale("sma-SE", None, 0x1c3b),
    locale("smj-NO", None, 0x103b),
    locale("smj-SE", None, 0x143b),
    locale("smn-FI", Some("smn"), 0x243b),
    locale("sms-FI", Some("sms"), 0x203b),
    locale("sq-AL", Some("sq"), 0x041c),
    locale("sr-Cyrl-BA", None, 0x1c1a),
    locale("sr-Cyrl-CS", None, 0x0c1a),
    locale("sr-Latn-BA", None, 0x181a),
    locale("sr-Latn-CS", None, 0x081a),
    locale("sv-FI", None, 0x081d),
    locale("sv-SE", Some("sv"), 0x041d),
    locale("sw-KE", Some("sw"), 0x0441),
    locale("syr-SY", Some("syr"), 0x045a),
    locale("ta-IN", Some("ta"), 0x0449),
    locale("te-IN", Some("te"), 0x044a),
    locale("tg-Cyrl-TJ", None, 0x0428),
    locale("th-TH", Some("th"), 0x041e),
    locale("ti-ET", Some("ti"), 0x0473),
    locale("tk-TM", Some("tk"), 0x0442),
    locale("tmz-Latn-DZ", None, 0x085f),
    locale("tn-ZA", Some("tn"), 0x0432),
    locale("tr-IN", None, 0x0820),
    locale("tr-TR", Some("tr"), 0x041f),
    locale("tt-RU", Some("tt"), 0x0444),
    locale("ug-CN", Some("ug"), 0x0480),
    locale("uk-UA", Some("uk"), 0x0422),
    locale("ur-PK", Some("ur"), 0x0420),
    locale("uz-Cyrl-UZ", None, 0x0843),
    locale("uz-Latn-UZ", None, 0x0443),
    locale("vi-VN", Some("vi"), 0x042a),
    locale("wen-DE", Some("wen"), 0x042e),
    locale("wo-SN", Some("wo"), 0x0488),
    locale("xh-ZA", Some("xh"), 0x0434),
    locale("yo-NG", Some("yo"), 0x046a),
    locale("za-CN", Some("za"), 0),
    // Chinese locales have no default short name.
    locale("zh-CN", None, 0x0804),
    locale("zh-HK", None, 0x0c04),
    locale("zh-MO", None, 0x1404),
    locale("zh-SG", None, 0x1004),
    locale("zh-TW", None, 0x0404),
    locale("zu-ZA", Some("zu"), 0x0435),
];

/// Locale used when nothing else is known
pub const DEFAULT_LOCALE: &str = "en";

/// Look up a full locale name, or a short name such as `en`.
pub fn find_locale(name: &str) -> Option<&'static LocaleInfo> {
    if let Ok(index) = LOCALES.binary_search_by(|info| info.name.cmp(name)) {
        return Some(&LOCALES[index]);
    }
    LOCALES.iter().find(|info| info.short_name == Some(name))
}

/// Decimal Windows locale identifier for a locale name, e.g. `"1033"` for
/// `en-US` or `en`.
pub fn windows_locale_id(name: &str) -> Option<String> {
    find_locale(name)
        .filter(|info| info.windows_id > 0)
        .map(|info| info.windows_id.to_string())
}

/// Short name of a locale, if it has one. A name that already is a short
/// name maps to itself.
pub fn locale_short_name(name: &str) -> Option<&'static str> {
    find_locale(name).and_then(|info| info.short_name)
}

/// Turn a POSIX locale value such as `zh_CN.UTF-8` into a locale name.
///
/// The language is lowercased and the territory uppercased; the short name
/// is preferred when the table has one. `C` and `POSIX` carry no locale.
pub fn locale_from_posix(value: &str) -> Option<String> {
    let value = value
        .split(|c| c == '.' || c == '@')
        .next()
        .unwrap_or_default()
        .trim();
    if value.is_empty() || value == "C" || value == "POSIX" {
        return None;
    }

    let mut parts = value.splitn(2, |c| c == '_' || c == '-');
    let language = parts.next().unwrap_or_default().to_ascii_lowercase();
    if language.is_empty() {
        return None;
    }
    match parts.next().filter(|territory| !territory.is_empty()) {
        Some(territory) => {
            let full = format!("{}-{}", language, territory.to_ascii_uppercase());
            Some(
                locale_short_name(&full)
                    .map(str::to_string)
                    .unwrap_or(full),
            )
        }
        None => Some(language),
    }
}

/// Locale of the current process, from `LC_ALL`, `LC_MESSAGES` or `LANG`
/// in that order, falling back to `en`.
pub fn system_locale_name() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
        .and_then(|value| locale_from_posix(&value))
        .unwrap_or_else(|| {
            debug!("No usable system locale, using {}", DEFAULT_LOCALE);
            DEFAULT_LOCALE.to_string()
        })
}
