//! Localized text catalog and the sticker logo catalog.
//!
//! Lookup is `(language, key) → text`, falling back to English when the
//! language or the key is missing.

use serde::{Deserialize, Serialize};

/// Supported interface languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    En,
    Uz,
    Ru,
}

impl Language {
    /// Language used when nothing else is known.
    pub const DEFAULT: Language = Language::En;

    /// All languages in menu order.
    pub const ALL: [Language; 3] = [Language::En, Language::Uz, Language::Ru];

    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Uz => "uz",
            Self::Ru => "ru",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Self::En),
            "uz" => Some(Self::Uz),
            "ru" => Some(Self::Ru),
            _ => None,
        }
    }

    /// Label shown on the language selection button.
    pub fn button_label(&self) -> &'static str {
        match self {
            Self::En => "🇬🇧 English",
            Self::Uz => "🇺🇿 O'zbekcha",
            Self::Ru => "🇷🇺 Русский",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Sticker logo categories (school stages).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Intensive,
    Core,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Intensive, Category::Core];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Intensive => "intensive",
            Self::Core => "core",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "intensive" => Some(Self::Intensive),
            "core" => Some(Self::Core),
            _ => None,
        }
    }

    /// Logo variants (tribes) offered for this category.
    pub fn variants(&self) -> &'static [&'static str] {
        match self {
            Self::Intensive => &["Ayiq", "Jayron", "Laylak", "Qoplon"],
            Self::Core => &["Pegasus", "Phoenix", "Minotaur", "Dragon"],
        }
    }

    pub fn has_variant(&self, variant: &str) -> bool {
        self.variants().contains(&variant)
    }

    /// Catalog key of the button label for this category.
    pub fn button_key(&self) -> &'static str {
        match self {
            Self::Intensive => keys::INTENSIVE_BUTTON,
            Self::Core => keys::CORE_BUTTON,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Message keys.
pub mod keys {
    pub const WELCOME: &str = "welcome";
    pub const LANG_SELECTED: &str = "lang_selected";
    pub const ASK_SUBSCRIBE: &str = "ask_subscribe";
    pub const CHANNEL_BUTTON: &str = "channel_button";
    pub const CONFIRM_BUTTON: &str = "confirm_button";
    pub const NOT_SUBSCRIBED: &str = "not_subscribed";
    pub const SUBSCRIPTION_CHECK_FAILED: &str = "subscription_check_failed";
    pub const ALREADY_REGISTERED: &str = "already_registered";
    pub const ASK_NICKNAME: &str = "ask_nickname";
    pub const INVALID_NICKNAME: &str = "invalid_nickname";
    pub const DIRECTORY_UNAVAILABLE: &str = "directory_unavailable";
    pub const ASK_REAL_NAME: &str = "ask_real_name";
    pub const EMPTY_REAL_NAME: &str = "empty_real_name";
    pub const STORAGE_UNAVAILABLE: &str = "storage_unavailable";
    pub const INTENSIVE_BUTTON: &str = "intensive_button";
    pub const CORE_BUTTON: &str = "core_button";
    pub const REGISTRATION_COMPLETE: &str = "registration_complete";
    pub const ASK_LOGO_STAGE: &str = "ask_logo_stage";
    pub const ASK_LOGO_TRIBE: &str = "ask_logo_tribe";
    pub const ORDER_COMPLETE: &str = "order_complete";
    pub const ADMIN_NOTIFICATION: &str = "admin_notification";
    pub const ADVERTISEMENT: &str = "advertisement";
    pub const CONTACT_ME_BUTTON: &str = "contact_me_button";
    pub const GET_BONUS_BUTTON: &str = "get_bonus_button";
    pub const FALLBACK_MESSAGE: &str = "fallback_message";
    pub const BONUS_INSTRUCTIONS: &str = "bonus_instructions";
    pub const BONUS_CONFIRMATION: &str = "bonus_confirmation";
    pub const BONUS_ALREADY_CLAIMED: &str = "bonus_already_claimed";
    pub const ADMIN_BONUS_CAPTION: &str = "admin_bonus_caption";
    pub const RESET_DONE: &str = "reset_done";
}

/// Look up a message, falling back to the default language, then to a
/// visible placeholder.
pub fn text(lang: Language, key: &str) -> String {
    lookup(catalog(lang), key)
        .or_else(|| lookup(catalog(Language::DEFAULT), key))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Missing text for key: {key}"))
}

/// Same as [`text`] for a raw language code (e.g. one read from storage).
pub fn text_for_code(code: &str, key: &str) -> String {
    text(Language::from_code(code).unwrap_or_default(), key)
}

/// Look up a message and substitute `{name}` placeholders.
pub fn render(lang: Language, key: &str, vars: &[(&str, &str)]) -> String {
    fill(&text(lang, key), vars)
}

/// Substitute `{name}` placeholders in a template.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn catalog(lang: Language) -> &'static [(&'static str, &'static str)] {
    match lang {
        Language::En => EN,
        Language::Uz => UZ,
        Language::Ru => RU,
    }
}

static EN: &[(&str, &str)] = &[
    (
        keys::WELCOME,
        "👋 Hello! I'm the official bot of the _Sticky Online Store_.\n\n\
         To celebrate our launch, we're giving away a *FREE* tribe sticker to every student at school 21!\n\n\
         Please select your language to continue.",
    ),
    (keys::LANG_SELECTED, "Language set to *English*."),
    (
        keys::ASK_SUBSCRIBE,
        "Great! To get your free sticker, you first need to be a member of our channel. \
         Please subscribe and then click the button below to confirm.",
    ),
    (keys::CHANNEL_BUTTON, "Go to Channel"),
    (keys::CONFIRM_BUTTON, "✅ I have subscribed"),
    (
        keys::NOT_SUBSCRIBED,
        "⚠️ You haven't subscribed to the channel yet. Please subscribe to proceed.",
    ),
    (
        keys::SUBSCRIPTION_CHECK_FAILED,
        "Sorry, I couldn't verify your subscription status right now. Please try again later.",
    ),
    (
        keys::ALREADY_REGISTERED,
        "You have already registered for a free sticker! Your order is being prepared.",
    ),
    (
        keys::ASK_NICKNAME,
        "✅ Subscription confirmed!\n\nLet's get you registered. What is your *nickname/login* at school 21?",
    ),
    (
        keys::INVALID_NICKNAME,
        "⚠️ *Invalid Nickname*\n\nWe couldn't find the nickname `{nickname}` in the school's database. \
         Please check for typos and try again.",
    ),
    (
        keys::DIRECTORY_UNAVAILABLE,
        "⏳ We couldn't reach the school's database right now. Please send your nickname again in a minute.",
    ),
    (
        keys::ASK_REAL_NAME,
        "✅ Nickname `{nickname}` verified!\n\nNow, please enter your *name* (e.g., John): \
         This will be used to verify your identity when you pick up the sticker.",
    ),
    (keys::EMPTY_REAL_NAME, "Please send your name as a text message."),
    (
        keys::STORAGE_UNAVAILABLE,
        "Sorry, something went wrong while saving your registration. Please send your name again.",
    ),
    (keys::INTENSIVE_BUTTON, "🚀 Intensive"),
    (keys::CORE_BUTTON, "🌱 Core"),
    (
        keys::REGISTRATION_COMPLETE,
        "🎉 *Registration Complete!*\n\nYou're all set. Now you can choose the logo for your free sticker.",
    ),
    (keys::ASK_LOGO_STAGE, "Which stage's logos would you like to choose from?"),
    (keys::ASK_LOGO_TRIBE, "Please choose a logo for your sticker."),
    (
        keys::ORDER_COMPLETE,
        "✅ *Order Confirmed!*\n\nYour `{chosen_logo}` sticker is confirmed. \
         The order will be available in the volunteers room from 26th November and you can pick it up from there any time you want!\n\n\
         Thank you for participating!",
    ),
    (
        keys::ADMIN_NOTIFICATION,
        "🔔 *New Sticker Order*\n\n\
         *User ID:* `{user_id}`\n\
         *Username:* @{username}\n\
         *Language:* `{lang}`\n\n\
         --- Registration ---\n\
         *Nickname:* `{nickname}`\n\
         *Real Name:* `{real_name}`\n\
         *Stage:* `{stage}`\n\
         *Tribe:* `{tribe}`\n\n\
         --- Order ---\n\
         *Chosen Logo:* `{chosen_logo}`",
    ),
    (
        keys::ADVERTISEMENT,
        "🔥 *Want a sticker with YOUR nickname on it?* 🔥\n\n\
         It's the ultimate custom sticker that no one else has!\n\n\
         *SPECIAL OFFER:*\n\
         ➡️ Buy *10* custom stickers of your choice, and get *1* FREE nickname sticker.\n\
         ➡️ Buy *20* custom stickers, and get *2* FREE nickname stickers!\n\n\
         Just send me the 10-20 images you want, tell me the sizes, and I'll handle the rest.\n\n\
         You can also get an *EXTRA FREE* sticker by sharing a post from our channel to your story! \
         Click the buttons below to start a custom order or get your bonus sticker.",
    ),
    (keys::CONTACT_ME_BUTTON, "💬 Contact Samir"),
    (keys::GET_BONUS_BUTTON, "✨ Get Bonus Sticker"),
    (
        keys::FALLBACK_MESSAGE,
        "Sorry, I didn't understand that. Please use the buttons or follow the instructions.",
    ),
    (
        keys::BONUS_INSTRUCTIONS,
        "Great! To get an extra FREE sticker, share _any_ post from our @sticky_online_store channel \
         to your Telegram (or Instagram) story for 24 hours. Once it's live, *download the image of your story* \
         and send it back to me here as proof!",
    ),
    (
        keys::BONUS_CONFIRMATION,
        "Thank you for sharing! We've received your story proof. Your special bonus sticker has been added to your order! 🎉",
    ),
    (
        keys::BONUS_ALREADY_CLAIMED,
        "You have already claimed your bonus sticker. See you in the volunteers room!",
    ),
    (
        keys::ADMIN_BONUS_CAPTION,
        "✅ *Bonus Sticker Proof*\n\nUser: @{username}\nNickname/Login: {nickname}\nName: {real_name}\n\nPlease verify their story.",
    ),
    (
        keys::RESET_DONE,
        "Your user data has been reset. You can now use /start again.",
    ),
];

static UZ: &[(&str, &str)] = &[
    (
        keys::WELCOME,
        "👋 Salom! Men *sticky_online_store*'ning rasmiy botiman.\n\n\
         Ochilishimiz munosabati bilan biz 21-maktabning har bir o'quvchisiga *BEPUL* tribe stikerini sovg'a qilamiz!\n\n\
         Davom etish uchun, iltimos, tilingizni tanlang.",
    ),
    (keys::LANG_SELECTED, "Til *O'zbekcha* qilib o'rnatildi."),
    (
        keys::ASK_SUBSCRIBE,
        "Ajoyib! Bepul stikeringizni olish uchun avval bizning kanalimizga a'zo bo'lishingiz kerak. \
         Iltimos, obuna bo'ling va tasdiqlash uchun quyidagi tugmani bosing.",
    ),
    (keys::CHANNEL_BUTTON, "Kanalga o'tish"),
    (keys::CONFIRM_BUTTON, "✅ Obuna bo'ldim"),
    (
        keys::NOT_SUBSCRIBED,
        "⚠️ Siz hali kanalga obuna bo'lmagansiz. Davom etish uchun obuna bo'ling.",
    ),
    (
        keys::ALREADY_REGISTERED,
        "Siz allaqachon bepul stiker uchun ro'yxatdan o'tgansiz! Buyurtmangiz tayyorlanmoqda.",
    ),
    (
        keys::ASK_NICKNAME,
        "✅ Obuna tasdiqlandi!\n\nKeling, sizni ro'yxatdan o'tkazamiz. 21-maktabdagi *nikneym/login* nima?",
    ),
    (
        keys::INVALID_NICKNAME,
        "⚠️ *Noto'g'ri Nikneym*\n\n`{nickname}` nikneymi maktab ma'lumotlar bazasidan topilmadi. \
         Iltimos, xatoliklarni tekshiring va qaytadan urunib ko'ring.",
    ),
    (
        keys::DIRECTORY_UNAVAILABLE,
        "⏳ Hozir maktab ma'lumotlar bazasiga ulanib bo'lmadi. Iltimos, bir daqiqadan so'ng nikneymingizni qayta yuboring.",
    ),
    (
        keys::ASK_REAL_NAME,
        "✅ `{nickname}` nikneymi tasdiqlandi!\n\nEndi, iltimos, *ismingizni* kiriting (masalan, Aziz): \
         Bu ma'lumot stikerni olayotganingizda shaxsingizni tasdiqlash uchun ishlatiladi.",
    ),
    (keys::INTENSIVE_BUTTON, "🚀 Intensive"),
    (keys::CORE_BUTTON, "🌱 Core"),
    (
        keys::REGISTRATION_COMPLETE,
        "🎉 *Ro'yxatdan o'tish yakunlandi!*\n\nEndi bepul stikeringiz uchun logotipni tanlashingiz mumkin.",
    ),
    (keys::ASK_LOGO_STAGE, "Qaysi bosqich trayb logotiplaridan tanlamoqchisiz?"),
    (keys::ASK_LOGO_TRIBE, "Iltimos, stikeringiz uchun logotip tanlang."),
    (
        keys::ORDER_COMPLETE,
        "✅ *Buyurtma tasdiqlandi!*\n\nSizning `{chosen_logo}` stikeringiz tasdiqlandi. \
         Buyurtma 26-noyabrdan boshlab volonterlar xonasida bo'ladi va uni xohlagan vaqtda olib ketishingiz mumkin!\n\n\
         Ishtirokingiz uchun rahmat!",
    ),
    (
        keys::ADVERTISEMENT,
        "🔥 *O'Z nikneymingiz tushirilgan stiker xohlaysizmi?* 🔥\n\n\
         Bu hech kimda yo'q, noyob stiker!\n\n\
         *MAXSUS TAKLIF:*\n\
         ➡️ O'zingiz tanlagan *10* ta stikerga buyurtma bering va *1* ta BEPUL nikneym stikerini qo'lga kiriting.\n\
         ➡️ *20* ta stikerga buyurtma bering va *2* ta BEPUL nikneym stikerini oling!\n\n\
         Menga 10-20 ta xohlagan rasmingizni yuboring, o'lchamlarini ayting, qolganini o'zim hal qilaman.\n\n\
         Shuningdek, kanalimizdan biror postni hikoyangizda ulashib, *QO'SHIMCHA BEPUL* stiker olishingiz mumkin! \
         Maxsus buyurtma berish yoki bonus stikerni olish uchun quyidagi tugmalarni bosing.",
    ),
    (keys::CONTACT_ME_BUTTON, "💬 Samir bilan bog'lanish"),
    (keys::GET_BONUS_BUTTON, "✨ Bonus stikerini olish"),
    (
        keys::FALLBACK_MESSAGE,
        "Kechirasiz, men buni tushunmadim. Iltimos, tugmalardan foydalaning yoki ko'rsatmalarga amal qiling.",
    ),
    (
        keys::BONUS_INSTRUCTIONS,
        "Ajoyib! Qo'shimcha BEPUL stiker olish uchun, @sticky_online_store kanalimizdagi _istalgan_ xabarni \
         24 soat davomida Telegram (yoki Instagram) hikoyangizda ulashing. U nashr qilingandan so'ng, \
         *hikoyangiz rasmini yuklab oling* va menga dalil sifatida yuboring!",
    ),
    (
        keys::BONUS_CONFIRMATION,
        "Ulashingiz uchun rahmat! Hikoyangiz tasdig'ini oldik. Maxsus bonus stikeringiz buyurtmangizga qo'shildi! 🎉",
    ),
];

static RU: &[(&str, &str)] = &[
    (
        keys::WELCOME,
        "👋 Привет! Я официальный бот *sticky_online_store*.\n\n\
         В честь нашего запуска мы дарим *БЕСПЛАТНЫЙ* стикер с логотипом твоего трайба каждому студенту школы 21!\n\n\
         Пожалуйста, выберите ваш язык для продолжения.",
    ),
    (keys::LANG_SELECTED, "Язык установлен на *Русский*."),
    (
        keys::ASK_SUBSCRIBE,
        "Отлично! Чтобы получить бесплатный стикер, вам нужно быть участником нашего канала. \
         Пожалуйста, подпишитесь, а затем нажмите кнопку ниже для подтверждения.",
    ),
    (keys::CHANNEL_BUTTON, "Перейти на канал"),
    (keys::CONFIRM_BUTTON, "✅ Я подписался"),
    (
        keys::NOT_SUBSCRIBED,
        "⚠️ Вы еще не подписались на канал. Пожалуйста, подпишитесь, чтобы продолжить.",
    ),
    (
        keys::SUBSCRIPTION_CHECK_FAILED,
        "Извините, сейчас не удалось проверить вашу подписку. Пожалуйста, попробуйте позже.",
    ),
    (
        keys::ALREADY_REGISTERED,
        "Вы уже зарегистрировались на получение бесплатного стикера! Ваш заказ готовится.",
    ),
    (
        keys::ASK_NICKNAME,
        "✅ Подписка подтверждена!\n\nДавайте вас зарегистрируем. Какой у вас *никнейм/логин* в школе 21?",
    ),
    (
        keys::INVALID_NICKNAME,
        "⚠️ *Неверный Никнейм*\n\nНикнейм `{nickname}` не найден в базе данных школы. \
         Пожалуйста, проверьте правильность написания и попробуйте снова.",
    ),
    (
        keys::DIRECTORY_UNAVAILABLE,
        "⏳ Сейчас не удалось связаться с базой данных школы. Пожалуйста, отправьте никнейм еще раз через минуту.",
    ),
    (
        keys::ASK_REAL_NAME,
        "✅ Никнейм `{nickname}` подтвержден!\n\nТеперь, пожалуйста, введите ваше *имя* (например, Иван): \
         Это имя будет использоваться для подтверждения вашей личности при получении стикера.",
    ),
    (keys::EMPTY_REAL_NAME, "Пожалуйста, отправьте ваше имя текстовым сообщением."),
    (keys::INTENSIVE_BUTTON, "🚀 Интенсив"),
    (keys::CORE_BUTTON, "🌱 Основа"),
    (
        keys::REGISTRATION_COMPLETE,
        "🎉 *Регистрация завершена!*\n\nТеперь вы можете выбрать логотип для вашего бесплатного стикера.",
    ),
    (keys::ASK_LOGO_STAGE, "Логотипы какого этапа вы бы хотели выбрать?"),
    (keys::ASK_LOGO_TRIBE, "Пожалуйста, выберите логотип для вашего стикера."),
    (
        keys::ORDER_COMPLETE,
        "✅ *Заказ подтвержден!*\n\nВаш стикер «{chosen_logo}» подтвержден. \
         Заказ будет доступен в комнате волонтеров с 26 ноября, и вы сможете забрать его оттуда в любое удобное для вас время!\n\n\
         Спасибо за участие!",
    ),
    (
        keys::ADVERTISEMENT,
        "🔥 *Хотите стикер с ВАШИМ никнеймом?* 🔥\n\n\
         Это уникальный кастомный стикер, которого нет больше ни у кого!\n\n\
         *СПЕЦИАЛЬНОЕ ПРЕДЛОЖЕНИЕ:*\n\
         ➡️ Купите *10* любых стикеров на ваш выбор и получите *1* БЕСПЛАТНЫЙ стикер с никнеймом.\n\
         ➡️ Купите *20* стикеров и получите *2* БЕСПЛАТНЫХ стикера с никнеймом!\n\n\
         Просто пришлите мне 10-20 изображений, которые вы хотите, укажите размеры, а я займусь остальным.\n\n\
         Вы также можете получить *ДОПОЛНИТЕЛЬНЫЙ БЕСПЛАТНЫЙ* стикер, поделившись постом из нашего канала в своей истории! \
         Нажмите кнопки ниже, чтобы начать индивидуальный заказ или получить бонусный стикер.",
    ),
    (keys::CONTACT_ME_BUTTON, "💬 Связаться с Самиром"),
    (keys::GET_BONUS_BUTTON, "✨ Получить бонусный стикер"),
    (
        keys::FALLBACK_MESSAGE,
        "Извините, я не понял. Пожалуйста, используйте кнопки или следуйте инструкциям.",
    ),
    (
        keys::BONUS_INSTRUCTIONS,
        "Отлично! Чтобы получить дополнительный БЕСПЛАТНЫЙ стикер, поделитесь _любым_ постом из нашего канала \
         @sticky_online_store в своей истории Telegram (или Instagram) на 24 часа. Как только он будет опубликован, \
         *скачайте изображение вашей истории* и отправьте его мне сюда в качестве подтверждения!",
    ),
    (
        keys::BONUS_CONFIRMATION,
        "Спасибо за то, что поделились! Мы получили подтверждение вашей истории. Ваш специальный бонусный стикер добавлен к вашему заказу! 🎉",
    ),
    (
        keys::BONUS_ALREADY_CLAIMED,
        "Вы уже получили бонусный стикер. Ждем вас в комнате волонтеров!",
    ),
];
