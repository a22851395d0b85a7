//! `userAccountControl` attribute flags.
//!
//! Ref: <https://learn.microsoft.com/troubleshoot/windows-server/active-directory/useraccountcontrol-manipulate-account-properties>

use bitflags::bitflags;

bitflags! {
    /// Flags of the `userAccountControl` attribute. Any subset may be
    /// set at the same time, e.g. `514` is a disabled normal account.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UserAccountControl: u32 {
        const SCRIPT = 1;
        const ACCOUNTDISABLE = 2;
        const HOMEDIR_REQUIRED = 8;
        const LOCKOUT = 16;
        const PASSWD_NOTREQD = 32;
        const PASSWD_CANT_CHANGE = 64;
        const ENCRYPTED_TEXT_PWD_ALLOWED = 128;
        const TEMP_DUPLICATE_ACCOUNT = 256;
        const NORMAL_ACCOUNT = 512;
        const INTERDOMAIN_TRUST_ACCOUNT = 2048;
        const WORKSTATION_TRUST_ACCOUNT = 4096;
        const SERVER_TRUST_ACCOUNT = 8192;
        const DONT_EXPIRE_PASSWORD = 65536;
        const MNS_LOGON_ACCOUNT = 131072;
        const SMARTCARD_REQUIRED = 262144;
        const TRUSTED_FOR_DELEGATION = 524288;
        const NOT_DELEGATED = 1048576;
        const USE_DES_KEY_ONLY = 2097152;
        const DONT_REQ_PREAUTH = 4194304;
        const PASSWORD_EXPIRED = 8388608;
        const TRUSTED_TO_AUTH_FOR_DELEGATION = 16777216;
        const PARTIAL_SECRETS_ACCOUNT = 67108864;
    }
}

/// Meaning of every flag, in value order.
pub const DESCRIPTIONS: [(UserAccountControl, &str); 22] = [
    (UserAccountControl::SCRIPT, "The logon script is run."),
    (UserAccountControl::ACCOUNTDISABLE, "The user account is disabled."),
    (UserAccountControl::HOMEDIR_REQUIRED, "The home folder is required."),
    (UserAccountControl::LOCKOUT, "The account is locked out."),
    (UserAccountControl::PASSWD_NOTREQD, "No password is required."),
    (UserAccountControl::PASSWD_CANT_CHANGE, "The user can't change the password."),
    (
        UserAccountControl::ENCRYPTED_TEXT_PWD_ALLOWED,
        "The user can send an encrypted password.",
    ),
    (
        UserAccountControl::TEMP_DUPLICATE_ACCOUNT,
        "Local user account for users whose primary account is in another domain.",
    ),
    (
        UserAccountControl::NORMAL_ACCOUNT,
        "Default account type that represents a typical user.",
    ),
    (
        UserAccountControl::INTERDOMAIN_TRUST_ACCOUNT,
        "Permit to trust an account for a system domain that trusts other domains.",
    ),
    (
        UserAccountControl::WORKSTATION_TRUST_ACCOUNT,
        "Computer account for a computer that is a member of this domain.",
    ),
    (
        UserAccountControl::SERVER_TRUST_ACCOUNT,
        "Computer account for a domain controller that is a member of this domain.",
    ),
    (UserAccountControl::DONT_EXPIRE_PASSWORD, "The password never expires."),
    (UserAccountControl::MNS_LOGON_ACCOUNT, "MNS logon account."),
    (
        UserAccountControl::SMARTCARD_REQUIRED,
        "The user must log on by using a smart card.",
    ),
    (
        UserAccountControl::TRUSTED_FOR_DELEGATION,
        "The service account is trusted for Kerberos delegation.",
    ),
    (
        UserAccountControl::NOT_DELEGATED,
        "The security context of the user isn't delegated to a service.",
    ),
    (
        UserAccountControl::USE_DES_KEY_ONLY,
        "Restrict this principal to use only DES encryption types for keys.",
    ),
    (
        UserAccountControl::DONT_REQ_PREAUTH,
        "The account doesn't require Kerberos pre-authentication for logon.",
    ),
    (UserAccountControl::PASSWORD_EXPIRED, "The user's password has expired."),
    (
        UserAccountControl::TRUSTED_TO_AUTH_FOR_DELEGATION,
        "The account is enabled for delegation.",
    ),
    (
        UserAccountControl::PARTIAL_SECRETS_ACCOUNT,
        "The account is a read-only domain controller (RODC).",
    ),
];

impl UserAccountControl {
    /// Decode a raw attribute value. Unknown bits are kept.
    pub fn decode(value: u32) -> Self {
        Self::from_bits_retain(value)
    }

    /// Parse the textual attribute value returned by the directory.
    pub fn parse(value: &str) -> Option<Self> {
        value.trim().parse::<u32>().ok().map(Self::decode)
    }

    /// Named flags present in this value.
    pub fn flags(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }

    /// Meaning of a single flag.
    pub fn describe(flag: Self) -> Option<&'static str> {
        DESCRIPTIONS
            .iter()
            .find(|(known, _)| *known == flag)
            .map(|(_, meaning)| *meaning)
    }

    pub fn is_disabled(&self) -> bool {
        self.contains(Self::ACCOUNTDISABLE)
    }

    pub fn is_locked(&self) -> bool {
        self.contains(Self::LOCKOUT)
    }
}
