//! User-facing message catalogue. Every string a client can see lives here in
//! both English and Arabic; handlers only ever pass a [`Msg`] key around.

use axum::http::{header::ACCEPT_LANGUAGE, HeaderMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    Ar,
}

impl Lang {
    /// Arabic when the first preference in `Accept-Language` is `ar` or `ar-*`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(raw) = headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok()) else {
            return Self::En;
        };
        let first = raw
            .split(',')
            .next()
            .unwrap_or("")
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if first == "ar" || first.starts_with("ar-") {
            Self::Ar
        } else {
            Self::En
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    InvalidJson,
    UsernameInvalid,
    EmailInvalid,
    PasswordRequired,
    PasswordTooShort,
    PasswordTooLong,
    PasswordNeedsUppercase,
    PasswordNeedsLowercase,
    PasswordNeedsDigit,
    FullNameInvalid,
    SectionOutOfRange,
    GroupInvalid,
    SectionGroupMismatch,
    StudentPlacementRequired,
    RoleInvalid,
    RosterMismatch,
    UsernameTaken,
    EmailTaken,
    InvalidCredentials,
    AccountDisabled,
    Unauthorized,
    Forbidden,
    CurrentPasswordIncorrect,
    ResetCodeInvalid,
    CannotDeleteSelf,
    UserNotFound,
    RecordNotFound,
    ArticleNotFound,
    TaskNotFound,
    ScheduleEntryNotFound,
    RouteNotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    BadRequest,
    TitleRequired,
    SubjectRequired,
    MessageRequired,
    InvalidDate,
    InvalidTime,
    InvalidDay,
    TimeRangeInvalid,
    PathInvalid,
    RosterImportEmpty,
    RateLimited,
    Internal,
    RegistrationSucceeded,
    LoginSucceeded,
    LoggedOut,
    ResetCodeSent,
    PasswordChanged,
}

impl Msg {
    /// Stable machine-readable code sent next to the localized text.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidJson => "invalid_json",
            Self::UsernameInvalid => "username_invalid",
            Self::EmailInvalid => "email_invalid",
            Self::PasswordRequired => "password_required",
            Self::PasswordTooShort => "password_too_short",
            Self::PasswordTooLong => "password_too_long",
            Self::PasswordNeedsUppercase => "password_needs_uppercase",
            Self::PasswordNeedsLowercase => "password_needs_lowercase",
            Self::PasswordNeedsDigit => "password_needs_digit",
            Self::FullNameInvalid => "full_name_invalid",
            Self::SectionOutOfRange => "section_out_of_range",
            Self::GroupInvalid => "group_invalid",
            Self::SectionGroupMismatch => "section_group_mismatch",
            Self::StudentPlacementRequired => "student_placement_required",
            Self::RoleInvalid => "role_invalid",
            Self::RosterMismatch => "roster_mismatch",
            Self::UsernameTaken => "username_taken",
            Self::EmailTaken => "email_taken",
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountDisabled => "account_disabled",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::CurrentPasswordIncorrect => "current_password_incorrect",
            Self::ResetCodeInvalid => "reset_code_invalid",
            Self::CannotDeleteSelf => "cannot_delete_self",
            Self::UserNotFound => "user_not_found",
            Self::RecordNotFound => "record_not_found",
            Self::ArticleNotFound => "article_not_found",
            Self::TaskNotFound => "task_not_found",
            Self::ScheduleEntryNotFound => "schedule_entry_not_found",
            Self::RouteNotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::PayloadTooLarge => "payload_too_large",
            Self::BadRequest => "bad_request",
            Self::TitleRequired => "title_required",
            Self::SubjectRequired => "subject_required",
            Self::MessageRequired => "message_required",
            Self::InvalidDate => "invalid_date",
            Self::InvalidTime => "invalid_time",
            Self::InvalidDay => "invalid_day",
            Self::TimeRangeInvalid => "time_range_invalid",
            Self::PathInvalid => "path_invalid",
            Self::RosterImportEmpty => "roster_import_empty",
            Self::RateLimited => "rate_limited",
            Self::Internal => "internal",
            Self::RegistrationSucceeded => "registered",
            Self::LoginSucceeded => "logged_in",
            Self::LoggedOut => "logged_out",
            Self::ResetCodeSent => "reset_code_sent",
            Self::PasswordChanged => "password_changed",
        }
    }

    pub fn text(self, lang: Lang) -> &'static str {
        match lang {
            Lang::En => self.en(),
            Lang::Ar => self.ar(),
        }
    }

    fn en(self) -> &'static str {
        match self {
            Self::InvalidJson => "Invalid request body",
            Self::UsernameInvalid => {
                "Username must be 3-30 characters of letters, digits, or underscores"
            }
            Self::EmailInvalid => "Invalid email address",
            Self::PasswordRequired => "Password is required",
            Self::PasswordTooShort => "Password must be at least 8 characters",
            Self::PasswordTooLong => "Password must be at most 128 characters",
            Self::PasswordNeedsUppercase => "Password must contain at least one uppercase letter",
            Self::PasswordNeedsLowercase => "Password must contain at least one lowercase letter",
            Self::PasswordNeedsDigit => "Password must contain at least one number",
            Self::FullNameInvalid => "Full name must be between 2 and 100 characters",
            Self::SectionOutOfRange => "Section number must be between 1 and 15",
            Self::GroupInvalid => "Group must be \"Group 1\" or \"Group 2\"",
            Self::SectionGroupMismatch => "Section number does not belong to the selected group",
            Self::StudentPlacementRequired => "Students must have a section and a group",
            Self::RoleInvalid => "Role must be \"student\" or \"admin\"",
            Self::RosterMismatch => "The submitted information does not match our records",
            Self::UsernameTaken => "Username is already taken",
            Self::EmailTaken => "Email is already registered",
            Self::InvalidCredentials => "Invalid username or password",
            Self::AccountDisabled => "This account has been disabled",
            Self::Unauthorized => "Authentication required",
            Self::Forbidden => "You do not have permission to perform this action",
            Self::CurrentPasswordIncorrect => "Current password is incorrect",
            Self::ResetCodeInvalid => "The verification code is invalid or has expired",
            Self::CannotDeleteSelf => "You cannot delete your own account",
            Self::UserNotFound => "User not found",
            Self::RecordNotFound => "Verification record not found",
            Self::ArticleNotFound => "Article not found",
            Self::TaskNotFound => "Task not found",
            Self::ScheduleEntryNotFound => "Schedule entry not found",
            Self::RouteNotFound => "Not found",
            Self::MethodNotAllowed => "Method not allowed",
            Self::PayloadTooLarge => "Request body is too large",
            Self::BadRequest => "Invalid request",
            Self::TitleRequired => "Title is required",
            Self::SubjectRequired => "Subject is required",
            Self::MessageRequired => "Message body is required",
            Self::InvalidDate => "Dates must use the YYYY-MM-DD format",
            Self::InvalidTime => "Times must use the HH:MM format",
            Self::InvalidDay => "Day must be a weekday name such as Sunday",
            Self::TimeRangeInvalid => "End time must be after start time",
            Self::PathInvalid => "Path must start with / and be at most 512 characters",
            Self::RosterImportEmpty => "No roster rows were provided",
            Self::RateLimited => "Too many attempts, please try again later",
            Self::Internal => "An unexpected error occurred",
            Self::RegistrationSucceeded => "Registration successful",
            Self::LoginSucceeded => "Login successful",
            Self::LoggedOut => "Logged out",
            Self::ResetCodeSent => "If the email is registered, a verification code has been sent",
            Self::PasswordChanged => "Password updated",
        }
    }

    fn ar(self) -> &'static str {
        match self {
            Self::InvalidJson => "بيانات الطلب غير صالحة",
            Self::UsernameInvalid => {
                "يجب أن يتكون اسم المستخدم من 3 إلى 30 حرفًا من الأحرف أو الأرقام أو الشرطة السفلية"
            }
            Self::EmailInvalid => "البريد الإلكتروني غير صالح",
            Self::PasswordRequired => "كلمة المرور مطلوبة",
            Self::PasswordTooShort => "يجب أن تتكون كلمة المرور من 8 أحرف على الأقل",
            Self::PasswordTooLong => "يجب ألا تتجاوز كلمة المرور 128 حرفًا",
            Self::PasswordNeedsUppercase => "يجب أن تحتوي كلمة المرور على حرف كبير واحد على الأقل",
            Self::PasswordNeedsLowercase => "يجب أن تحتوي كلمة المرور على حرف صغير واحد على الأقل",
            Self::PasswordNeedsDigit => "يجب أن تحتوي كلمة المرور على رقم واحد على الأقل",
            Self::FullNameInvalid => "يجب أن يكون الاسم الكامل بين 2 و100 حرف",
            Self::SectionOutOfRange => "يجب أن يكون رقم الشعبة بين 1 و15",
            Self::GroupInvalid => "يجب أن تكون المجموعة \"Group 1\" أو \"Group 2\"",
            Self::SectionGroupMismatch => "رقم الشعبة لا ينتمي إلى المجموعة المختارة",
            Self::StudentPlacementRequired => "يجب تحديد الشعبة والمجموعة للطالب",
            Self::RoleInvalid => "يجب أن يكون الدور \"student\" أو \"admin\"",
            Self::RosterMismatch => "البيانات المدخلة لا تطابق السجلات لدينا",
            Self::UsernameTaken => "اسم المستخدم مستخدم بالفعل",
            Self::EmailTaken => "البريد الإلكتروني مسجل بالفعل",
            Self::InvalidCredentials => "اسم المستخدم أو كلمة المرور غير صحيحة",
            Self::AccountDisabled => "تم تعطيل هذا الحساب",
            Self::Unauthorized => "يجب تسجيل الدخول",
            Self::Forbidden => "ليس لديك صلاحية لتنفيذ هذا الإجراء",
            Self::CurrentPasswordIncorrect => "كلمة المرور الحالية غير صحيحة",
            Self::ResetCodeInvalid => "رمز التحقق غير صالح أو منتهي الصلاحية",
            Self::CannotDeleteSelf => "لا يمكنك حذف حسابك الخاص",
            Self::UserNotFound => "المستخدم غير موجود",
            Self::RecordNotFound => "سجل التحقق غير موجود",
            Self::ArticleNotFound => "المقال غير موجود",
            Self::TaskNotFound => "المهمة غير موجودة",
            Self::ScheduleEntryNotFound => "الحصة غير موجودة",
            Self::RouteNotFound => "غير موجود",
            Self::MethodNotAllowed => "طريقة الطلب غير مسموح بها",
            Self::PayloadTooLarge => "حجم الطلب كبير جدًا",
            Self::BadRequest => "طلب غير صالح",
            Self::TitleRequired => "العنوان مطلوب",
            Self::SubjectRequired => "الموضوع مطلوب",
            Self::MessageRequired => "نص الرسالة مطلوب",
            Self::InvalidDate => "يجب أن يكون التاريخ بصيغة YYYY-MM-DD",
            Self::InvalidTime => "يجب أن يكون الوقت بصيغة HH:MM",
            Self::InvalidDay => "يجب أن يكون اليوم اسم يوم من أيام الأسبوع",
            Self::TimeRangeInvalid => "يجب أن يكون وقت النهاية بعد وقت البداية",
            Self::PathInvalid => "يجب أن يبدأ المسار بالرمز / وألا يتجاوز 512 حرفًا",
            Self::RosterImportEmpty => "لم يتم تقديم أي سجلات",
            Self::RateLimited => "محاولات كثيرة، يرجى المحاولة لاحقًا",
            Self::Internal => "حدث خطأ غير متوقع",
            Self::RegistrationSucceeded => "تم التسجيل بنجاح",
            Self::LoginSucceeded => "تم تسجيل الدخول بنجاح",
            Self::LoggedOut => "تم تسجيل الخروج",
            Self::ResetCodeSent => "إذا كان البريد الإلكتروني مسجلاً، فقد تم إرسال رمز التحقق",
            Self::PasswordChanged => "تم تحديث كلمة المرور",
        }
    }
}
